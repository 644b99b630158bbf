// # Resource Vector Algebra
//
// Fixed-width resource arithmetic over {cpu_cores, ram, disk}. Components
// may be unset, meaning "unknown / not applicable". An unset component on
// the left side of `fits` is treated as infinite capacity; an unset
// subtrahend counts as zero.
//
// CPU allocations are kept in tenths of a core so that arithmetic and
// equality stay exact; inputs are normalized up to the nearest 0.1 core.

use std::fmt;
use std::ops::Add;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Result, SchedulerError};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;
pub const TIB: u64 = 1024 * GIB;

/// CPU capacity in tenths of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuCores(u64);

impl CpuCores {
    /// Normalizes up to the nearest tenth of a core.
    pub fn from_cores(cores: f64) -> Self {
        CpuCores((cores * 10.0).ceil().max(0.0) as u64)
    }

    pub fn from_tenths(tenths: u64) -> Self {
        CpuCores(tenths)
    }

    pub fn tenths(self) -> u64 {
        self.0
    }

    pub fn as_cores(self) -> f64 {
        self.0 as f64 / 10.0
    }

    pub fn checked_sub(self, other: CpuCores) -> Option<CpuCores> {
        self.0.checked_sub(other.0).map(CpuCores)
    }
}

impl Add for CpuCores {
    type Output = CpuCores;

    fn add(self, other: CpuCores) -> CpuCores {
        CpuCores(self.0 + other.0)
    }
}

impl fmt::Display for CpuCores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_cores())
    }
}

impl Serialize for CpuCores {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_cores())
    }
}

impl<'de> Deserialize<'de> for CpuCores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let cores = f64::deserialize(deserializer)?;
        if cores < 0.0 || !cores.is_finite() {
            return Err(de::Error::custom("cpu_cores must be a non-negative number"));
        }
        Ok(CpuCores::from_cores(cores))
    }
}

/// Parses a byte count from a human string such as "512MiB", "1GiB" or
/// "10GB". Bare digit strings are taken as byte counts.
pub fn parse_byte_size(input: &str) -> Option<u64> {
    let text = input.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.parse().ok()?;
    if value < 0.0 {
        return None;
    }
    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1000,
        "mb" => 1000 * 1000,
        "gb" => 1000 * 1000 * 1000,
        "tb" => 1000 * 1000 * 1000 * 1000,
        "kib" => KIB,
        "mib" => MIB,
        "gib" => GIB,
        "tib" => TIB,
        _ => return None,
    };
    Some((value * multiplier as f64).round() as u64)
}

/// Deserializes an optional byte count from either an integer or a human
/// string; byte counts are always serialized back as plain integers.
pub fn de_opt_byte_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Count(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Count(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => parse_byte_size(&text)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid byte size: {text}"))),
    }
}

/// A triple of resource capacities. All scheduler accounting flows
/// through this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVector {
    #[serde(default)]
    pub cpu_cores: Option<CpuCores>,
    #[serde(default, deserialize_with = "de_opt_byte_size")]
    pub ram: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_byte_size")]
    pub disk: Option<u64>,
}

impl ResourceVector {
    pub fn new(cpu_cores: f64, ram: u64, disk: u64) -> Self {
        ResourceVector {
            cpu_cores: Some(CpuCores::from_cores(cpu_cores)),
            ram: Some(ram),
            disk: Some(disk),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cpu_cores.is_some() && self.ram.is_some() && self.disk.is_some()
    }

    /// Every set component on self covers the corresponding component on
    /// `other`; unset components on self count as infinite.
    pub fn fits(&self, other: &ResourceVector) -> bool {
        fn component_fits<T: PartialOrd>(own: Option<T>, required: Option<T>) -> bool {
            match (own, required) {
                (_, None) | (None, Some(_)) => true,
                (Some(a), Some(b)) => a >= b,
            }
        }
        component_fits(self.cpu_cores, other.cpu_cores)
            && component_fits(self.ram, other.ram)
            && component_fits(self.disk, other.disk)
    }

    /// Component-wise subtraction. An unset subtrahend counts as zero; a
    /// set component subtracted from an unset one leaves it unset.
    pub fn checked_sub(&self, other: &ResourceVector) -> Result<ResourceVector> {
        let cpu_cores = match (self.cpu_cores, other.cpu_cores) {
            (Some(a), Some(b)) => Some(a.checked_sub(b).ok_or_else(|| {
                SchedulerError::ResourceUnderflow(format!("cpu_cores: {a} - {b}"))
            })?),
            (own, _) => own,
        };
        let ram = match (self.ram, other.ram) {
            (Some(a), Some(b)) => Some(a.checked_sub(b).ok_or_else(|| {
                SchedulerError::ResourceUnderflow(format!("ram: {a} - {b}"))
            })?),
            (own, _) => own,
        };
        let disk = match (self.disk, other.disk) {
            (Some(a), Some(b)) => Some(a.checked_sub(b).ok_or_else(|| {
                SchedulerError::ResourceUnderflow(format!("disk: {a} - {b}"))
            })?),
            (own, _) => own,
        };
        Ok(ResourceVector { cpu_cores, ram, disk })
    }

    /// Caps each component at `limit` (unset limit components are
    /// infinite) and lifts it to at least `floor` where one is given.
    pub fn get_compliant(
        &self,
        limit: &ResourceVector,
        floor: Option<&ResourceVector>,
    ) -> ResourceVector {
        fn component<T: Copy + Ord>(own: Option<T>, limit: Option<T>, floor: Option<T>) -> Option<T> {
            let capped = match (own, limit) {
                (Some(a), Some(l)) => Some(a.min(l)),
                (own, _) => own,
            };
            match (capped, floor) {
                (Some(v), Some(f)) => Some(v.max(f)),
                (None, Some(f)) => Some(f),
                (v, None) => v,
            }
        }
        ResourceVector {
            cpu_cores: component(
                self.cpu_cores,
                limit.cpu_cores,
                floor.and_then(|f| f.cpu_cores),
            ),
            ram: component(self.ram, limit.ram, floor.and_then(|f| f.ram)),
            disk: component(self.disk, limit.disk, floor.and_then(|f| f.disk)),
        }
    }
}

impl Add for ResourceVector {
    type Output = ResourceVector;

    /// Component-wise addition; unset counts as zero, but the result is
    /// set whenever either side is.
    fn add(self, other: ResourceVector) -> ResourceVector {
        fn component<T: Add<Output = T>>(a: Option<T>, b: Option<T>) -> Option<T> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a + b),
                (Some(a), None) => Some(a),
                (None, b) => b,
            }
        }
        ResourceVector {
            cpu_cores: component(self.cpu_cores, other.cpu_cores),
            ram: component(self.ram, other.ram),
            disk: component(self.disk, other.disk),
        }
    }
}

/// Allocation granted to an instance on first placement, before floors
/// and limits are applied.
pub fn base_allocation() -> ResourceVector {
    ResourceVector::new(1.0, GIB, 10 * GIB)
}
