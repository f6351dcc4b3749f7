//! End-to-end compilation scenarios

use l2i_core::{Deployment, DiagnosticCode, Profile, Rate, Severity, Stage};
use l2i_emit::{Artifact, Backend};
use l2i_pipeline::{Pipeline, PolicyConfig};
use l2i_plan::MeterInstance;
use serde_json::{json, Value};

fn deployment(profile: &str) -> Deployment {
    Deployment::single("A", Profile::embedded(profile).unwrap())
}

fn flow(id: &str, port: &str, priority: &str) -> Value {
    json!({
        "id": id, "src": "10.0.0.1", "dst": "10.0.0.3", "port": port,
        "dst_port": 5001,
        "priority": priority,
        "bandwidth": {"min_mbps": 1.0, "max_mbps": 2.0},
        "latency_max_ms": 30
    })
}

fn group_spec(id: &str, group: u32) -> Value {
    json!({
        "id": id,
        "flows": [],
        "multicast": [{"id": group, "members": ["p1", "p2"], "replicas": 2}]
    })
}

#[test]
fn test_five_tiers_overflow_legacy_queues() {
    let tiers = ["best_effort", "low", "medium", "high", "critical"];
    let flows: Vec<Value> = tiers
        .iter()
        .enumerate()
        .map(|(i, tier)| flow(&format!("f{}", i), "eth0", tier))
        .collect();
    let doc = json!({"id": "s1", "flows": flows});

    let result = Pipeline::new()
        .with_policy(PolicyConfig::permissive())
        .compile(&[doc], &deployment("legacy"));

    assert_eq!(result.stage(), Stage::Capability);
    assert!(result.plan().is_none());
    let overflow: Vec<_> = result
        .diagnostics()
        .iter()
        .filter(|d| d.code == DiagnosticCode::QueueOverflow)
        .collect();
    assert_eq!(overflow.len(), 1);
    assert_eq!(overflow[0].location, "ports[id=eth0]");
    assert!(overflow[0].is_blocking());
}

#[test]
fn test_p4_meter_clamped_to_profile_max() {
    let doc = json!({
        "id": "s1",
        "flows": [],
        "meters": [{"id": "m1", "rate_mbps": 50000.0}]
    });

    let result = Pipeline::new()
        .with_policy(PolicyConfig::permissive())
        .compile(&[doc], &deployment("p4"));

    assert!(result.is_planned());
    assert_eq!(result.diagnostics().len(), 1);
    let adjustment = &result.diagnostics()[0];
    assert_eq!(adjustment.code, DiagnosticCode::MeterRateClamped);
    assert_eq!(adjustment.severity, Severity::Adjustment);

    let meter = &result.plan().unwrap().domains[0].meters[0];
    assert!(matches!(meter.instance, MeterInstance::Trtcm { .. }));
    assert_eq!(meter.instance.peak_rate(), Rate::from_mbps(40_000));
}

#[test]
fn test_group_collision_names_group_and_specs() {
    let result = Pipeline::new().compile(
        &[group_spec("s_beta", 7), group_spec("s_alpha", 7)],
        &deployment("p4"),
    );

    assert_eq!(result.stage(), Stage::Composition);
    assert!(result.plan().is_none());
    let conflict = result.diagnostics().last().unwrap();
    assert_eq!(conflict.code, DiagnosticCode::GroupCollision);
    assert_eq!(conflict.severity, Severity::Fatal);
    assert!(conflict.message.contains('7'));
    assert!(conflict.message.contains("s_alpha"));
    assert!(conflict.message.contains("s_beta"));
}

fn flood_groups(id: &str, first: u32, count: u32) -> Value {
    let groups: Vec<Value> = (first..first + count)
        .map(|group| {
            json!({"id": group, "members": ["eth0", "eth1"], "replicas": 2, "mode": "flood"})
        })
        .collect();
    json!({"id": id, "flows": [], "multicast": groups})
}

fn tiered_spec(id: &str, tiers: &[&str]) -> Value {
    let flows: Vec<Value> = tiers
        .iter()
        .enumerate()
        .map(|(i, tier)| flow(&format!("{}_{}", id, i), "eth0", tier))
        .collect();
    json!({"id": id, "flows": flows})
}

#[test]
fn test_merged_groups_exceed_domain_limit() {
    let x = flood_groups("x", 1, 64);
    let y = flood_groups("y", 100, 1);
    let pipeline = Pipeline::new();
    let legacy = deployment("legacy");

    assert!(pipeline.compile(std::slice::from_ref(&x), &legacy).is_planned());
    assert!(pipeline.compile(std::slice::from_ref(&y), &legacy).is_planned());

    let xy = pipeline.compile(&[x.clone(), y.clone()], &legacy);
    assert_eq!(xy.stage(), Stage::Composition);
    let conflict = xy.diagnostics().last().unwrap();
    assert_eq!(conflict.code, DiagnosticCode::GroupLimitExceeded);
    assert_eq!(conflict.severity, Severity::Fatal);
    assert_eq!(conflict.stage, Stage::Composition);
    assert!(conflict.message.contains("x, y"));
    assert!(conflict.message.contains("64"));
    assert!(xy
        .diagnostics()
        .iter()
        .all(|d| d.code != DiagnosticCode::InternalInconsistency));

    let yx = pipeline.compile(&[y, x], &legacy);
    assert_eq!(xy, yx);
}

#[test]
fn test_merged_tiers_exceed_port_queues() {
    let x = tiered_spec("x", &["best_effort", "low", "medium", "high"]);
    let y = tiered_spec("y", &["critical"]);
    let pipeline = Pipeline::new().with_policy(PolicyConfig::permissive());
    let legacy = deployment("legacy");

    assert!(pipeline.compile(std::slice::from_ref(&x), &legacy).is_planned());
    assert!(pipeline.compile(std::slice::from_ref(&y), &legacy).is_planned());

    let xy = pipeline.compile(&[x.clone(), y.clone()], &legacy);
    assert_eq!(xy.stage(), Stage::Composition);
    let conflict = xy.diagnostics().last().unwrap();
    assert_eq!(conflict.code, DiagnosticCode::QueueContention);
    assert_eq!(conflict.stage, Stage::Composition);
    assert_eq!(conflict.location, "domains[id=A].ports[id=eth0]");
    assert!(conflict.message.contains("x, y"));

    let yx = pipeline.compile(&[y, x], &legacy);
    assert_eq!(xy, yx);
}

#[test]
fn test_merged_tiers_within_queues_plan() {
    let x = tiered_spec("x", &["low", "high"]);
    let y = tiered_spec("y", &["medium", "high"]);
    let result = Pipeline::new().compile(&[x, y], &deployment("legacy"));
    let plan = result.plan().unwrap();
    let queues: Vec<u32> = plan.domains[0].queues.iter().map(|q| q.queue).collect();
    assert!(queues.iter().all(|&q| q < 4));
    assert_eq!(queues.iter().max(), Some(&2));
}

#[test]
fn test_single_flow_yields_one_netconf_fragment() {
    let doc = json!({"id": "s1", "flows": [flow("f1", "eth0", "medium")]});
    let pipeline = Pipeline::new();
    let result = pipeline.compile(&[doc], &deployment("legacy"));

    let plan = result.plan().unwrap();
    let artifacts = pipeline.emit(plan, &[Backend::Netconf]);
    let Artifact::Netconf(netconf) = &artifacts[0] else {
        panic!("expected a netconf artifact");
    };
    assert_eq!(netconf.fragment_count(), 1);
    assert!(!netconf.render_xml().is_empty());
}

#[test]
fn test_policy_denial_skips_capability() {
    // critical breaches the default hard ceiling; eth9 would fail capability
    let doc = json!({"id": "s1", "flows": [flow("f1", "eth9", "critical")]});
    let result = Pipeline::new().compile(&[doc], &deployment("legacy"));

    assert_eq!(result.stage(), Stage::Policy);
    assert!(result
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::PriorityCeiling));
    assert!(result
        .diagnostics()
        .iter()
        .all(|d| d.stage != Stage::Capability));
}

#[test]
fn test_one_denied_document_halts_batch() {
    let good = json!({"id": "s1", "flows": [flow("f1", "eth0", "low")]});
    let bad = json!({"id": "s2", "flows": [flow("f1", "eth9", "low")]});
    let result = Pipeline::new().compile(&[good, bad], &deployment("legacy"));
    assert_eq!(result.stage(), Stage::Capability);
    assert!(result
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::UnknownPort));
}

#[test]
fn test_compilation_is_deterministic() {
    let docs = vec![
        json!({
            "id": "s1",
            "flows": [flow("f1", "p1", "high"), flow("f2", "p2", "low")],
            "meters": [{"id": "m1", "flow": "f1", "rate_mbps": 3.0}],
            "requirements": {"atomic_commit": true}
        }),
        group_spec("s2", 9),
    ];
    let deployment = deployment("p4");
    let pipeline = Pipeline::new();

    let first = pipeline.compile(&docs, &deployment);
    let second = pipeline.compile(&docs, &deployment);
    assert_eq!(first, second);

    let plan = first.plan().unwrap();
    for backend in Backend::ALL {
        let a = pipeline.emit(plan, &[backend]).remove(0);
        let b = pipeline.emit(second.plan().unwrap(), &[backend]).remove(0);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}

#[test]
fn test_document_order_does_not_change_plan() {
    let x = json!({"id": "x", "flows": [flow("f1", "p1", "high")]});
    let y = group_spec("y", 3);
    let deployment = deployment("p4");
    let pipeline = Pipeline::new();

    let xy = pipeline.compile(&[x.clone(), y.clone()], &deployment);
    let yx = pipeline.compile(&[y, x], &deployment);
    assert_eq!(xy.plan(), yx.plan());
    assert!(xy.is_planned());
}

#[test]
fn test_multi_domain_plan() {
    let deployment = Deployment::new()
        .with_domain("A", Profile::embedded("legacy").unwrap())
        .unwrap()
        .with_domain("B", Profile::embedded("p4").unwrap())
        .unwrap();
    let docs = vec![
        json!({"id": "s1", "domain": "A", "flows": [flow("f1", "eth0", "medium")]}),
        json!({"id": "s2", "domain": "B", "flows": [flow("f1", "p1", "medium")]}),
    ];
    let result = Pipeline::new().compile(&docs, &deployment);
    let plan = result.plan().unwrap();
    let domains: Vec<_> = plan.domains.iter().map(|d| d.domain.as_str()).collect();
    assert_eq!(domains, vec!["A", "B"]);
    assert_eq!(plan.domain("B").unwrap().profile_id, "p4-bmv2-basic");
}

#[test]
fn test_missing_domain_in_multi_domain_deployment() {
    let deployment = Deployment::new()
        .with_domain("A", Profile::embedded("legacy").unwrap())
        .unwrap()
        .with_domain("B", Profile::embedded("p4").unwrap())
        .unwrap();
    let doc = json!({"id": "s1", "flows": [flow("f1", "eth0", "medium")]});
    let result = Pipeline::new().compile(&[doc], &deployment);
    assert_eq!(result.stage(), Stage::Capability);
    assert_eq!(result.diagnostics()[0].code, DiagnosticCode::UnknownDomain);
}
