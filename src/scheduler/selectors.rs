// Preemption selectors. A selector decides whether `requester` may claim
// resources currently held by `target`; they are plain function values so
// alternate policies can be injected in tests.

use crate::models::{Service, ServiceType};

pub type Selector = fn(&Service, &Service) -> bool;

fn type_bonus(service_type: ServiceType) -> u32 {
    match service_type {
        ServiceType::Stateless => 0,
        ServiceType::Fragile => 100,
        ServiceType::Stateful => 200,
    }
}

/// Priority adjusted by the service-type bonus. Priorities live in
/// [0, 99], so a higher type always outranks any priority below it.
pub fn priority_key(service: &Service) -> u32 {
    u32::from(service.priority) + type_bonus(service.service_type)
}

/// Plain priority comparison, ignoring service types.
pub fn any_with_lower_priority(requester: &Service, target: &Service) -> bool {
    requester.priority > target.priority
}

/// Default preemption policy: compare type-adjusted priorities, so a
/// service never evicts one of a higher type.
pub fn same_or_lower_type_with_lower_priority(requester: &Service, target: &Service) -> bool {
    priority_key(requester) > priority_key(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ResourceVector, GIB};
    use uuid::Uuid;

    fn service(service_type: ServiceType, priority: u8) -> Service {
        Service::new(
            Uuid::new_v4(),
            service_type,
            priority,
            ResourceVector::new(2.0, 4 * GIB, 40 * GIB),
            ResourceVector::new(1.0, GIB, 10 * GIB),
        )
    }

    #[test]
    fn test_any_with_lower_priority() {
        let high = service(ServiceType::Stateless, 99);
        let low = service(ServiceType::Stateful, 0);
        assert!(any_with_lower_priority(&high, &low));
        assert!(!any_with_lower_priority(&low, &high));
        assert!(!any_with_lower_priority(&high, &high));
    }

    #[test]
    fn test_type_shields_beat_priority() {
        let stateless_high = service(ServiceType::Stateless, 99);
        let stateful_low = service(ServiceType::Stateful, 0);
        let fragile_low = service(ServiceType::Fragile, 0);

        assert!(!same_or_lower_type_with_lower_priority(
            &stateless_high,
            &stateful_low
        ));
        assert!(!same_or_lower_type_with_lower_priority(
            &stateless_high,
            &fragile_low
        ));
        assert!(same_or_lower_type_with_lower_priority(
            &stateful_low,
            &stateless_high
        ));
    }

    #[test]
    fn test_same_type_falls_back_to_priority() {
        let high = service(ServiceType::Fragile, 10);
        let low = service(ServiceType::Fragile, 9);
        assert!(same_or_lower_type_with_lower_priority(&high, &low));
        assert!(!same_or_lower_type_with_lower_priority(&low, &high));
        assert!(!same_or_lower_type_with_lower_priority(&high, &high));
    }
}
