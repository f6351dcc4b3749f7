//! NETCONF-like emitter.
//!
//! Each domain becomes one edit session: a `merge` fragment per queue, meter
//! and multicast action, in IR order. Atomic domains edit the `candidate`
//! datastore and end with a commit; the rest edit `running` directly.

use crate::artifact::{Backend, CanonicalArtifact, Emitter};
use l2i_plan::{
    CommitMode, DomainAction, IrPlan, MeterAction, MeterInstance, MulticastAction, QueueAction,
    Replication, Scheduling,
};
use serde::{Deserialize, Serialize};
use std::fmt;

const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Target datastore of an edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datastore {
    /// Staged; applied by an explicit commit
    Candidate,
    /// Live configuration
    Running,
}

impl Datastore {
    /// XML element name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Running => "running",
        }
    }
}

/// Edit operation of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOperation {
    /// Merge into existing configuration
    Merge,
}

impl EditOperation {
    /// Attribute value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
        }
    }
}

/// A configuration leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Leaf {
    /// Leaf name
    pub name: String,
    /// Rendered value
    pub value: String,
}

impl Leaf {
    fn new(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// One edit-config change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditConfigFragment {
    /// Operation
    pub operation: EditOperation,
    /// Instance path of the edited node
    pub path: String,
    /// Leaves set under the node
    pub leaves: Vec<Leaf>,
}

/// All edits for one domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditSession {
    /// Domain id
    pub domain: String,
    /// Profile the plan was resolved against
    pub profile_id: String,
    /// Datastore edited
    pub target: Datastore,
    /// Whether a commit follows the edits
    pub commit: bool,
    /// Fragments, in IR order
    pub fragments: Vec<EditConfigFragment>,
}

/// NETCONF-like rendering of an IR plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetconfArtifact {
    /// IR schema version
    pub version: String,
    /// One session per domain
    pub sessions: Vec<EditSession>,
}

impl NetconfArtifact {
    /// Total fragments across sessions
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.sessions.iter().map(|s| s.fragments.len()).sum()
    }

    /// Render as NETCONF RPC XML
    #[must_use]
    pub fn render_xml(&self) -> String {
        self.to_string()
    }
}

impl CanonicalArtifact for NetconfArtifact {}

impl fmt::Display for NetconfArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        let mut message_id = 1u32;
        for session in &self.sessions {
            writeln!(
                f,
                "<!-- domain {} ({}) -->",
                comment_text(&session.domain),
                comment_text(&session.profile_id)
            )?;
            writeln!(f, r#"<rpc message-id="{}" xmlns="{}">"#, message_id, NETCONF_NS)?;
            writeln!(f, "  <edit-config>")?;
            writeln!(f, "    <target><{}/></target>", session.target.as_str())?;
            writeln!(f, "    <config>")?;
            for fragment in &session.fragments {
                writeln!(
                    f,
                    r#"      <edit operation="{}" path="{}">"#,
                    fragment.operation.as_str(),
                    escape(&fragment.path)
                )?;
                for leaf in &fragment.leaves {
                    writeln!(f, "        <{0}>{1}</{0}>", leaf.name, escape(&leaf.value))?;
                }
                writeln!(f, "      </edit>")?;
            }
            writeln!(f, "    </config>")?;
            writeln!(f, "  </edit-config>")?;
            writeln!(f, "</rpc>")?;
            message_id += 1;

            if session.commit {
                writeln!(
                    f,
                    r#"<rpc message-id="{}" xmlns="{}"><commit/></rpc>"#,
                    message_id, NETCONF_NS
                )?;
                message_id += 1;
            }
        }
        Ok(())
    }
}

/// Text allowed inside `<!-- -->`: no `--` and no trailing `-`
fn comment_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '-' && out.ends_with('-') {
            out.push(' ');
        }
        out.push(c);
    }
    if out.ends_with('-') {
        out.push(' ');
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Emits [`NetconfArtifact`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct NetconfEmitter;

impl NetconfEmitter {
    /// Create a new emitter
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Emitter for NetconfEmitter {
    type Artifact = NetconfArtifact;

    fn backend(&self) -> Backend {
        Backend::Netconf
    }

    fn emit(&self, plan: &IrPlan) -> NetconfArtifact {
        let sessions: Vec<EditSession> = plan.domains.iter().map(session).collect();
        let artifact = NetconfArtifact {
            version: plan.version.to_string(),
            sessions,
        };
        tracing::debug!(
            sessions = artifact.sessions.len(),
            fragments = artifact.fragment_count(),
            "netconf artifact emitted"
        );
        artifact
    }
}

fn session(domain: &DomainAction) -> EditSession {
    let atomic = domain.commit == CommitMode::Atomic;
    let fragments = domain
        .queues
        .iter()
        .map(queue_fragment)
        .chain(domain.meters.iter().map(meter_fragment))
        .chain(domain.multicast.iter().map(multicast_fragment))
        .collect();

    EditSession {
        domain: domain.domain.clone(),
        profile_id: domain.profile_id.clone(),
        target: if atomic {
            Datastore::Candidate
        } else {
            Datastore::Running
        },
        commit: atomic,
        fragments,
    }
}

fn merge(path: String, leaves: Vec<Leaf>) -> EditConfigFragment {
    EditConfigFragment {
        operation: EditOperation::Merge,
        path,
        leaves,
    }
}

fn queue_fragment(q: &QueueAction) -> EditConfigFragment {
    let mut leaves = vec![
        Leaf::new("spec", &q.spec),
        Leaf::new("flow", &q.flow),
        Leaf::new("source-address", &q.matches.src),
        Leaf::new("destination-address", &q.matches.dst),
    ];
    if let Some(port) = q.matches.dst_port {
        leaves.push(Leaf::new("destination-port", port));
    }
    leaves.push(Leaf::new("dscp", q.dscp));
    match q.scheduling {
        Scheduling::Strict => leaves.push(Leaf::new("scheduler", "strict-priority")),
        Scheduling::Wfq { weight } => {
            leaves.push(Leaf::new("scheduler", "wfq"));
            leaves.push(Leaf::new("weight", weight));
        }
    }
    leaves.push(Leaf::new("min-rate-kbps", q.min_rate.kbps()));
    leaves.push(Leaf::new("max-rate-kbps", q.max_rate.kbps()));

    merge(
        format!(
            "/qos/interfaces/interface[name='{}']/queues/queue[id='{}']/classifier[name='{}/{}']",
            q.port, q.queue, q.spec, q.flow
        ),
        leaves,
    )
}

fn meter_fragment(m: &MeterAction) -> EditConfigFragment {
    let mut leaves = vec![
        Leaf::new("spec", &m.spec),
        Leaf::new("index", m.index),
        Leaf::new("algorithm", m.instance.algorithm()),
    ];
    if let Some((flow, _)) = &m.flow {
        leaves.push(Leaf::new("flow", flow));
    }
    match m.instance {
        MeterInstance::Tbf { rate, burst } => {
            leaves.push(Leaf::new("rate-kbps", rate.kbps()));
            leaves.push(Leaf::new("burst-bytes", burst));
        }
        MeterInstance::Srtcm { cir, cbs, ebs } => {
            leaves.push(Leaf::new("cir-kbps", cir.kbps()));
            leaves.push(Leaf::new("cbs-bytes", cbs));
            leaves.push(Leaf::new("ebs-bytes", ebs));
        }
        MeterInstance::Trtcm { cir, pir, cbs, pbs } => {
            leaves.push(Leaf::new("cir-kbps", cir.kbps()));
            leaves.push(Leaf::new("pir-kbps", pir.kbps()));
            leaves.push(Leaf::new("cbs-bytes", cbs));
            leaves.push(Leaf::new("pbs-bytes", pbs));
        }
    }
    merge(format!("/qos/policers/policer[name='{}/{}']", m.spec, m.meter), leaves)
}

fn multicast_fragment(g: &MulticastAction) -> EditConfigFragment {
    let mut leaves = vec![Leaf::new("spec", &g.spec)];
    if let Some(address) = &g.address {
        leaves.push(Leaf::new("group-address", address));
    }
    match &g.replication {
        Replication::Flood => leaves.push(Leaf::new("replication", "vlan-flood")),
        Replication::Static { replicas } => {
            leaves.push(Leaf::new("replication", "static"));
            for replica in replicas {
                leaves.push(Leaf::new(
                    "replica",
                    format!("{}#{}", replica.port, replica.instance),
                ));
            }
        }
    }
    merge(format!("/multicast/groups/group[id='{}']", g.group_id), leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_single_flow_single_fragment() {
        let artifact = NetconfEmitter::new().emit(&fixtures::single_flow());
        assert_eq!(artifact.fragment_count(), 1);
        let session = &artifact.sessions[0];
        assert_eq!(session.target, Datastore::Running);
        assert!(!session.commit);
        assert!(session.fragments[0].path.contains("interface[name='eth0']"));
    }

    #[test]
    fn test_atomic_domain_uses_candidate() {
        let artifact = NetconfEmitter::new().emit(&fixtures::full());
        let session = &artifact.sessions[0];
        assert_eq!(session.target, Datastore::Candidate);
        assert!(session.commit);
        assert_eq!(artifact.fragment_count(), 4);
        let xml = artifact.render_xml();
        assert!(xml.contains("<target><candidate/></target>"));
        assert!(xml.contains("<commit/>"));
        assert!(xml.contains("<pir-kbps>8000</pir-kbps>"));
        assert!(xml.contains("<replica>p2#1</replica>"));
    }

    #[test]
    fn test_fragment_order_follows_ir() {
        let artifact = NetconfEmitter::new().emit(&fixtures::full());
        let paths: Vec<_> = artifact.sessions[0]
            .fragments
            .iter()
            .map(|f| f.path.split('/').nth(1).unwrap_or_default().to_string())
            .collect();
        assert_eq!(paths, vec!["qos", "qos", "multicast", "multicast"]);
    }

    #[test]
    fn test_byte_identical() {
        let plan = fixtures::full();
        let a = NetconfEmitter::new().emit(&plan);
        let b = NetconfEmitter::new().emit(&plan);
        assert_eq!(a.render_xml(), b.render_xml());
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn test_comment_text() {
        assert_eq!(comment_text("core--edge"), "core- -edge");
        assert_eq!(comment_text("a---b-"), "a- - -b- ");
        assert_eq!(comment_text("plain"), "plain");
    }

    #[test]
    fn test_domain_comment_is_well_formed() {
        let mut plan = fixtures::single_flow();
        plan.domains[0].domain = "core--edge-".to_string();
        let xml = NetconfEmitter::new().emit(&plan).render_xml();
        let comment = xml.lines().nth(1).unwrap();
        let body = comment
            .strip_prefix("<!--")
            .and_then(|c| c.strip_suffix("-->"))
            .unwrap();
        assert!(!body.contains("--"));
        assert!(!body.ends_with('-'));
        assert!(body.contains("core- -edge- "));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }
}
