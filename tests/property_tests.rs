//! Property tests for resolution, formatting and request scoping.

use std::sync::Arc;

use audit_core::{
    Argument, AuditFormat, AuditPipeline, AuditRecord, AuditTrail, CallMetadata,
    FirstArgumentResolver, RequestIdentity, RequestScope, ResourceResolver, render,
};
use proptest::prelude::*;

// Separator-free text so that splitting a single-line entry is unambiguous.
fn arb_field() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9_.:-]{1,12}").unwrap()
}

fn arb_address() -> impl Strategy<Value = String> {
    (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
        .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d))
}

fn arb_argument() -> impl Strategy<Value = Argument> {
    prop_oneof![
        arb_field().prop_map(Argument::from),
        prop::collection::vec(arb_field(), 0..5).prop_map(Argument::from),
    ]
}

proptest! {
    /// A prefixed resolver renders a list first argument behind its prefix.
    #[test]
    fn prefixed_first_argument(
        prefix in arb_field(),
        items in prop::collection::vec(arb_field(), 0..6),
    ) {
        let resolver = FirstArgumentResolver::with_prefix(prefix.clone());
        let args = [Argument::from(items.clone())];
        let expected = format!("{}[{}]", prefix, items.join(", "));

        prop_assert_eq!(resolver.resolve_on_success(&args, &()).unwrap(), vec![expected.clone()]);
        prop_assert_eq!(resolver.resolve_on_failure(&args, &"failed").unwrap(), vec![expected]);
    }

    /// Without a prefix the resource is the first argument's string form.
    #[test]
    fn unprefixed_first_argument(first in arb_argument(), rest in prop::collection::vec(arb_argument(), 0..3)) {
        let mut args = vec![first.clone()];
        args.extend(rest);

        let resources = FirstArgumentResolver::new().resolve_on_success(&args, &()).unwrap();
        prop_assert_eq!(resources, vec![first.to_string()]);
    }

    /// A single-line entry splits into the seven fields in fixed order.
    #[test]
    fn single_line_has_seven_ordered_fields(
        principal in arb_field(),
        action in arb_field(),
        application in arb_field(),
        resource in arb_field(),
        server in arb_address(),
        client in arb_address(),
    ) {
        let record = AuditRecord::builder(principal.clone(), action.clone(), application.clone())
            .resource(resource.clone())
            .identity(&RequestIdentity::new(server.clone(), client.clone()))
            .build();

        let line = render(&record, AuditFormat::SingleLine, false, "|").unwrap();
        let fields: Vec<&str> = line.split('|').collect();

        prop_assert_eq!(fields.len(), 7);
        prop_assert_eq!(fields[0], record.when_string());
        prop_assert_eq!(fields[1], application);
        prop_assert_eq!(fields[2], format!("[{}]", resource));
        prop_assert_eq!(fields[3], action);
        prop_assert_eq!(fields[4], principal);
        prop_assert_eq!(fields[5], client);
        prop_assert_eq!(fields[6], server);
    }

    /// After clear the scope reports the empty identity, whatever was set.
    #[test]
    fn cleared_scope_is_empty(server in arb_address(), client in arb_address()) {
        let mut scope = RequestScope::new();
        scope.set(RequestIdentity::new(server.clone(), client.clone()));
        prop_assert_eq!(scope.get().server_ip_address(), server);

        scope.clear();
        prop_assert!(!scope.is_set());
        prop_assert_eq!(scope.get().client_ip_address(), "unknown");
        prop_assert_eq!(scope.get().server_ip_address(), "unknown");
    }

    /// Every intercepted call yields exactly one record, success or failure.
    #[test]
    fn one_record_per_call(outcomes in prop::collection::vec(any::<bool>(), 1..20)) {
        let trail = Arc::new(AuditTrail::new());
        let pipeline = AuditPipeline::builder()
            .resolver(FirstArgumentResolver::new())
            .sink(trail.clone())
            .build();
        let scope = RequestScope::new();
        let metadata = CallMetadata::new("svc", "TOGGLE", "APP");

        for (i, succeed) in outcomes.iter().enumerate() {
            let outcome = pipeline
                .intercept(&scope, "toggle", &metadata, &[Argument::from(i)], |_| {
                    if *succeed { Ok(i) } else { Err(format!("failed {}", i)) }
                })
                .unwrap();
            prop_assert_eq!(outcome.is_ok(), *succeed);
        }

        prop_assert_eq!(trail.len(), outcomes.len());
    }
}
