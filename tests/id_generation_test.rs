use datadesk::idgen::Namespace;

#[test]
fn next_prefixed_ticket_after_hq_009_is_hq_010() {
    let ns = Namespace::ticket(Some("HQ"));
    let last = ns.seed_from(["HQ-001", "HQ-005", "HQ-009"]);
    assert_eq!(ns.format(last + 1), "HQ-010");
}

#[test]
fn next_fallback_ticket_after_t099_is_t100() {
    let ns = Namespace::ticket(None);
    let last = ns.seed_from(["T001", "T099"]);
    assert_eq!(ns.format(last + 1), "T100");
}

#[test]
fn company_after_c9_is_c010() {
    // Numeric parse of "9" gives 10, padded back to three digits.
    let ns = Namespace::plain("C");
    let last = ns.seed_from(["C9"]);
    assert_eq!(ns.format(last + 1), "C010");
}

#[test]
fn first_ticket_in_bkk_branch_is_bkk_001() {
    let ns = Namespace::ticket(Some("BKK"));
    assert_eq!(ns.format(ns.seed_from([]) + 1), "BKK-001");
}

#[test]
fn sequences_are_strictly_increasing_unique_and_gapless() {
    for ns in [
        Namespace::plain("C"),
        Namespace::plain("B"),
        Namespace::plain("A"),
        Namespace::plain("DC"),
        Namespace::ticket(Some("HQ")),
        Namespace::ticket(None),
    ] {
        let mut generated = Vec::new();
        let mut last = ns.seed_from([]);
        for _ in 0..20 {
            last += 1;
            generated.push(ns.format(last));
        }
        let parsed: Vec<i64> = generated.iter().map(|id| ns.parse(id).unwrap()).collect();
        assert_eq!(parsed, (1..=20).collect::<Vec<i64>>());
        let unique: std::collections::HashSet<&String> = generated.iter().collect();
        assert_eq!(unique.len(), generated.len());
    }
}

#[test]
fn prefixed_and_fallback_spaces_never_mix() {
    let prefixed = Namespace::ticket(Some("HQ"));
    let fallback = Namespace::ticket(None);
    let ids = ["HQ-030", "T030", "T-030"];
    assert_eq!(prefixed.seed_from(ids), 30);
    // "T-030" is dashed, so it belongs to neither the fallback space nor HQ.
    assert_eq!(fallback.seed_from(ids), 30);
    assert_eq!(fallback.parse("T-030"), None);
}

#[test]
fn padding_grows_without_truncation() {
    let ns = Namespace::plain("DC");
    assert_eq!(ns.format(1000), "DC1000");
    assert_eq!(ns.parse("DC1000"), Some(1000));
}
