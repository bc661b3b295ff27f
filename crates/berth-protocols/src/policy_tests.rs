use super::*;

#[test]
fn test_default_is_self_first() {
    let policy = LookupPolicy::new();
    assert_eq!(policy.resolve("com.acme.orders"), LookupOrder::SelfFirst);
    assert_eq!(policy.resolve(""), LookupOrder::SelfFirst);
    assert!(policy.is_empty());
}

#[test]
fn test_prefix_matches_on_segment_boundary() {
    let policy = LookupPolicy::with_packages(["com.acme"], LookupOrder::ParentFirst);

    assert_eq!(policy.resolve("com.acme"), LookupOrder::ParentFirst);
    assert_eq!(policy.resolve("com.acme.shared"), LookupOrder::ParentFirst);
    assert_eq!(policy.resolve("com.acmecorp"), LookupOrder::SelfFirst);
    assert_eq!(policy.resolve("com"), LookupOrder::SelfFirst);
}

#[test]
fn test_longest_prefix_wins() {
    let policy = LookupPolicy::with_packages(["com.acme"], LookupOrder::ParentFirst)
        .extend_packages(["com.acme.orders"], LookupOrder::SelfFirst);

    assert_eq!(policy.resolve("com.acme.shared"), LookupOrder::ParentFirst);
    assert_eq!(policy.resolve("com.acme.orders.model"), LookupOrder::SelfFirst);
}

#[test]
fn test_extend_is_pure() {
    let base = LookupPolicy::with_packages(["org.slf4j"], LookupOrder::ParentFirst);
    let overrides = LookupPolicy::with_packages(["org.slf4j"], LookupOrder::SelfFirst)
        .extend_packages(["com.acme.shared"], LookupOrder::ParentFirst);

    let derived = base.extend(&overrides);

    assert_eq!(base.resolve("org.slf4j"), LookupOrder::ParentFirst);
    assert_eq!(base.resolve("com.acme.shared"), LookupOrder::SelfFirst);
    assert_eq!(derived.resolve("org.slf4j"), LookupOrder::SelfFirst);
    assert_eq!(derived.resolve("com.acme.shared.Foo"), LookupOrder::ParentFirst);
}

#[test]
fn test_extend_packages_skips_root_package() {
    let policy = LookupPolicy::new().extend_packages(["", "com.acme"], LookupOrder::ParentFirst);
    let prefixes: Vec<_> = policy.overrides().map(|(p, _)| p.to_string()).collect();
    assert_eq!(prefixes, vec!["com.acme".to_string()]);
}

#[test]
fn test_policy_serde() {
    let policy = LookupPolicy::with_packages(["com.acme"], LookupOrder::ParentFirst);
    let json = serde_json::to_string(&policy).unwrap();
    assert!(json.contains("parent_first"));
    let back: LookupPolicy = serde_json::from_str(&json).unwrap();
    assert_eq!(back, policy);
}
