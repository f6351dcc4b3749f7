//! Intent document validator.
//!
//! Checks run in three passes (structure, field ranges, cross-field
//! consistency) and every violation is reported, in that order, in one
//! call. The validator is total: any JSON value is accepted as input.

use crate::canonical::{
    BandwidthRange, CanonicalSpec, Flow, MeterRequest, MulticastGroup, PriorityTier, Requirements,
};
use indexmap::IndexSet;
use l2i_core::{
    location, Diagnostic, DiagnosticCode, GroupMode, MeterAlgorithm, Rate, SchemaVersion,
    TelemetryMetric,
};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Diagnostics bucketed by pass, concatenated at the end
#[derive(Default)]
struct Findings {
    structural: Vec<Diagnostic>,
    range: Vec<Diagnostic>,
    cross: Vec<Diagnostic>,
}

impl Findings {
    fn structural(&mut self, code: DiagnosticCode, location: &str, message: String) {
        self.structural
            .push(Diagnostic::fatal(code, location, message));
    }

    fn range(&mut self, code: DiagnosticCode, location: &str, message: String) {
        self.range.push(Diagnostic::fatal(code, location, message));
    }

    fn cross(&mut self, code: DiagnosticCode, location: &str, message: String) {
        self.cross.push(Diagnostic::fatal(code, location, message));
    }

    fn is_empty(&self) -> bool {
        self.structural.is_empty() && self.range.is_empty() && self.cross.is_empty()
    }

    fn into_vec(self) -> Vec<Diagnostic> {
        let mut all = self.structural;
        all.extend(self.range);
        all.extend(self.cross);
        all
    }
}

/// Validator turning raw intent documents into canonical specs
#[derive(Debug, Clone)]
pub struct Validator {
    /// Maximum flows per document (0 = no limit)
    pub max_flows: usize,
    /// Maximum multicast groups per document (0 = no limit)
    pub max_groups: usize,
}

impl Validator {
    /// Create a new validator
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_flows: 0,
            max_groups: 0,
        }
    }

    /// Set maximum flow count
    #[must_use]
    pub fn with_max_flows(mut self, max: usize) -> Self {
        self.max_flows = max;
        self
    }

    /// Set maximum multicast group count
    #[must_use]
    pub fn with_max_groups(mut self, max: usize) -> Self {
        self.max_groups = max;
        self
    }

    /// Validate a raw intent document
    ///
    /// # Errors
    ///
    /// Returns every `fatal` validation diagnostic found; the list is never
    /// empty on error
    pub fn validate(&self, doc: &Value) -> Result<CanonicalSpec, Vec<Diagnostic>> {
        let mut findings = Findings::default();
        let spec = self.check_document(doc, &mut findings);

        match spec {
            Some(mut spec) if findings.is_empty() => {
                spec.normalize();
                tracing::debug!(spec = %spec.id, flows = spec.flows.len(), "intent validated");
                Ok(spec)
            }
            _ => {
                let diagnostics = findings.into_vec();
                tracing::debug!(diagnostics = diagnostics.len(), "intent rejected");
                Err(diagnostics)
            }
        }
    }

    fn check_document(&self, doc: &Value, out: &mut Findings) -> Option<CanonicalSpec> {
        let Some(obj) = doc.as_object() else {
            out.structural(
                DiagnosticCode::InvalidType,
                "$",
                format!("intent document must be an object, found {}", type_name(doc)),
            );
            return None;
        };

        let version = check_version(obj, out);
        let id = req_str(obj, "id", "$", out);
        let domain = opt_str(obj, "domain", "$", out);

        let flows_decoded = matches!(obj.get("flows"), Some(Value::Array(_)));
        let flows = match req_array(obj, "flows", "$", out) {
            Some(items) => {
                if self.max_flows > 0 && items.len() > self.max_flows {
                    out.range(
                        DiagnosticCode::OutOfRange,
                        "flows",
                        format!("{} flows exceed the limit of {}", items.len(), self.max_flows),
                    );
                }
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| check_flow(v, &location::indexed("flows", i), out))
                    .collect::<Vec<_>>()
            }
            None => Vec::new(),
        };

        let groups = match opt_array(obj, "multicast", "$", out) {
            Some(items) => {
                if self.max_groups > 0 && items.len() > self.max_groups {
                    out.range(
                        DiagnosticCode::OutOfRange,
                        "multicast",
                        format!(
                            "{} groups exceed the limit of {}",
                            items.len(),
                            self.max_groups
                        ),
                    );
                }
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| check_group(v, &location::indexed("multicast", i), out))
                    .collect::<Vec<_>>()
            }
            None => Vec::new(),
        };

        let meters = opt_array(obj, "meters", "$", out)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| check_meter(v, &location::indexed("meters", i), out))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let requirements = check_requirements(obj, out);

        check_cross_references(&flows, &groups, &meters, out);

        if flows_decoded && flows.is_empty() && groups.is_empty() && meters.is_empty() {
            out.cross(
                DiagnosticCode::EmptyIntent,
                "$",
                "intent requests no flows, multicast groups or meters".to_string(),
            );
        }

        Some(CanonicalSpec {
            version: version?,
            id: id?,
            domain,
            flows: flows.into_iter().collect::<Option<Vec<_>>>()?,
            multicast: groups.into_iter().collect::<Option<Vec<_>>>()?,
            meters: meters.into_iter().collect::<Option<Vec<_>>>()?,
            requirements: requirements?,
        })
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn check_version(obj: &Map<String, Value>, out: &mut Findings) -> Option<SchemaVersion> {
    let raw = match obj.get("version") {
        None => return Some(SchemaVersion::CURRENT),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            out.structural(
                DiagnosticCode::InvalidType,
                "version",
                format!("expected string, found {}", type_name(other)),
            );
            return None;
        }
    };
    match SchemaVersion::parse(&raw) {
        Ok(v) if v.is_supported() => Some(v),
        _ => {
            out.structural(
                DiagnosticCode::UnsupportedVersion,
                "version",
                format!(
                    "schema version {:?} is not supported (expected {})",
                    raw,
                    SchemaVersion::CURRENT
                ),
            );
            None
        }
    }
}

fn check_flow(value: &Value, loc: &str, out: &mut Findings) -> Option<Flow> {
    let obj = as_object(value, loc, out)?;

    let id = req_str(obj, "id", loc, out);
    let src = req_str(obj, "src", loc, out);
    let dst = req_str(obj, "dst", loc, out);
    let port = req_str(obj, "port", loc, out);
    let dst_port = opt_uint(obj, "dst_port", loc, out).and_then(|p| {
        let field = join(loc, "dst_port");
        match u16::try_from(p) {
            Ok(p) => Some(p),
            Err(_) => {
                out.range(
                    DiagnosticCode::OutOfRange,
                    &field,
                    format!("L4 port {} exceeds 65535", p),
                );
                None
            }
        }
    });

    let priority = req_str(obj, "priority", loc, out).and_then(|p| {
        let parsed = PriorityTier::parse(&p);
        if parsed.is_none() {
            out.structural(
                DiagnosticCode::UnknownPriority,
                &join(loc, "priority"),
                format!(
                    "unknown priority {:?}; expected one of {}",
                    p,
                    PriorityTier::ALL.map(PriorityTier::as_str).join(", ")
                ),
            );
        }
        parsed
    });

    let bandwidth = check_bandwidth(obj, loc, out);

    let latency_max_ms = req_number(obj, "latency_max_ms", loc, out).and_then(|ms| {
        if ms < 0.0 {
            out.range(
                DiagnosticCode::NegativeLatency,
                &join(loc, "latency_max_ms"),
                format!("latency bound {} ms is negative", ms),
            );
            None
        } else {
            Some(ms)
        }
    });

    let weight = opt_number(obj, "weight", loc, out);
    if let Some(w) = weight.flatten() {
        if w <= 0.0 {
            out.range(
                DiagnosticCode::OutOfRange,
                &join(loc, "weight"),
                format!("WFQ weight {} must be positive", w),
            );
        }
    }

    let dscp = opt_uint(obj, "dscp", loc, out).and_then(|d| {
        if d > 63 {
            out.range(
                DiagnosticCode::OutOfRange,
                &join(loc, "dscp"),
                format!("DSCP {} exceeds 63", d),
            );
            None
        } else {
            u8::try_from(d).ok()
        }
    });

    Some(Flow {
        id: id?,
        src: src?,
        dst: dst?,
        port: port?,
        dst_port,
        priority: priority?,
        bandwidth: bandwidth?,
        latency_max_ms: latency_max_ms?,
        weight: weight?,
        dscp,
    })
}

fn check_bandwidth(obj: &Map<String, Value>, loc: &str, out: &mut Findings) -> Option<BandwidthRange> {
    let loc = join(loc, "bandwidth");
    let bw = match obj.get("bandwidth") {
        None => {
            out.structural(
                DiagnosticCode::MissingField,
                &loc,
                "required field is missing".to_string(),
            );
            return None;
        }
        Some(v) => as_object(v, &loc, out)?,
    };

    let min = req_number(bw, "min_mbps", &loc, out).and_then(|v| positive_rate(v, &join(&loc, "min_mbps"), out));
    let max = req_number(bw, "max_mbps", &loc, out).and_then(|v| positive_rate(v, &join(&loc, "max_mbps"), out));
    let (min, max) = (min?, max?);

    if min > max {
        out.range(
            DiagnosticCode::BandwidthRange,
            &loc,
            format!("min {} exceeds max {}", min, max),
        );
        return None;
    }
    Some(BandwidthRange { min, max })
}

fn check_group(value: &Value, loc: &str, out: &mut Findings) -> Option<MulticastGroup> {
    let obj = as_object(value, loc, out)?;

    let id = req_uint(obj, "id", loc, out).and_then(|id| {
        match u32::try_from(id) {
            Ok(0) | Err(_) => {
                out.range(
                    DiagnosticCode::OutOfRange,
                    &join(loc, "id"),
                    format!("group id {} must be between 1 and {}", id, u32::MAX),
                );
                None
            }
            Ok(id) => Some(id),
        }
    });

    let members = req_array(obj, "members", loc, out).and_then(|items| {
        let members_loc = join(loc, "members");
        let mut members = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) if !s.trim().is_empty() => members.push(s.to_string()),
                Some(_) => {
                    out.range(
                        DiagnosticCode::OutOfRange,
                        &location::indexed(&members_loc, i),
                        "member must not be empty".to_string(),
                    );
                    ok = false;
                }
                None => {
                    out.structural(
                        DiagnosticCode::InvalidType,
                        &location::indexed(&members_loc, i),
                        format!("expected string, found {}", type_name(item)),
                    );
                    ok = false;
                }
            }
        }
        if members.is_empty() && ok {
            out.range(
                DiagnosticCode::OutOfRange,
                &members_loc,
                "group needs at least one member".to_string(),
            );
            ok = false;
        }
        ok.then_some(members)
    });

    let replicas = req_uint(obj, "replicas", loc, out).and_then(|r| match u32::try_from(r) {
        Ok(0) | Err(_) => {
            out.range(
                DiagnosticCode::OutOfRange,
                &join(loc, "replicas"),
                format!("replica count {} must be between 1 and {}", r, u32::MAX),
            );
            None
        }
        Ok(r) => Some(r),
    });

    let mode = match opt_str(obj, "mode", loc, out) {
        None => Some(GroupMode::Static),
        Some(m) => {
            let parsed = GroupMode::parse(&m);
            if parsed.is_none() {
                out.structural(
                    DiagnosticCode::UnknownValue,
                    &join(loc, "mode"),
                    format!("unknown multicast mode {:?}; expected flood, static or dynamic", m),
                );
            }
            parsed
        }
    };

    let address = opt_str(obj, "address", loc, out);

    Some(MulticastGroup {
        id: id?,
        members: members?,
        replicas: replicas?,
        mode: mode?,
        address,
    })
}

fn check_meter(value: &Value, loc: &str, out: &mut Findings) -> Option<MeterRequest> {
    let obj = as_object(value, loc, out)?;

    let id = req_str(obj, "id", loc, out);
    let flow = opt_str(obj, "flow", loc, out);
    let rate = req_number(obj, "rate_mbps", loc, out)
        .and_then(|v| positive_rate(v, &join(loc, "rate_mbps"), out));

    let burst_kbytes = opt_uint(obj, "burst_kbytes", loc, out).and_then(|b| {
        match u32::try_from(b) {
            Ok(0) | Err(_) => {
                out.range(
                    DiagnosticCode::OutOfRange,
                    &join(loc, "burst_kbytes"),
                    format!("burst {} kB must be between 1 and {}", b, u32::MAX),
                );
                None
            }
            Ok(b) => Some(b),
        }
    });

    let algorithm = match opt_str(obj, "algorithm", loc, out) {
        None => Some(None),
        Some(a) => match MeterAlgorithm::parse(&a) {
            Some(alg) => Some(Some(alg)),
            None => {
                out.structural(
                    DiagnosticCode::UnknownValue,
                    &join(loc, "algorithm"),
                    format!("unknown meter algorithm {:?}; expected tbf, srtcm or trtcm", a),
                );
                None
            }
        },
    };

    Some(MeterRequest {
        id: id?,
        flow,
        rate: rate?,
        burst_kbytes,
        algorithm: algorithm?,
    })
}

fn check_requirements(obj: &Map<String, Value>, out: &mut Findings) -> Option<Requirements> {
    let loc = "requirements";
    let req = match obj.get(loc) {
        None => return Some(Requirements::default()),
        Some(v) => as_object(v, loc, out)?,
    };

    let atomic_commit = opt_bool(req, "atomic_commit", loc, out);

    let telemetry = match opt_array(req, "telemetry", loc, out) {
        None => Some(BTreeSet::new()),
        Some(items) => {
            let mut metrics = BTreeSet::new();
            let mut ok = true;
            for (i, item) in items.iter().enumerate() {
                let item_loc = location::indexed(&format!("{}.telemetry", loc), i);
                match item.as_str() {
                    Some(s) => match TelemetryMetric::parse(s) {
                        Some(m) => {
                            metrics.insert(m);
                        }
                        None => {
                            out.structural(
                                DiagnosticCode::UnknownValue,
                                &item_loc,
                                format!("unknown telemetry metric {:?}", s),
                            );
                            ok = false;
                        }
                    },
                    None => {
                        out.structural(
                            DiagnosticCode::InvalidType,
                            &item_loc,
                            format!("expected string, found {}", type_name(item)),
                        );
                        ok = false;
                    }
                }
            }
            ok.then_some(metrics)
        }
    };

    let rounds = opt_uint(req, "max_negotiation_rounds", loc, out).and_then(|r| {
        match u32::try_from(r) {
            Ok(0) | Err(_) => {
                out.range(
                    DiagnosticCode::OutOfRange,
                    &join(loc, "max_negotiation_rounds"),
                    format!("negotiation rounds {} must be between 1 and {}", r, u32::MAX),
                );
                None
            }
            Ok(r) => Some(r),
        }
    });

    Some(Requirements {
        atomic_commit: atomic_commit?.unwrap_or(false),
        telemetry: telemetry?,
        max_negotiation_rounds: rounds,
    })
}

fn check_cross_references(
    flows: &[Option<Flow>],
    groups: &[Option<MulticastGroup>],
    meters: &[Option<MeterRequest>],
    out: &mut Findings,
) {
    let mut flow_ids = IndexSet::new();
    for (i, flow) in flows.iter().enumerate() {
        if let Some(flow) = flow {
            if !flow_ids.insert(flow.id.as_str()) {
                out.cross(
                    DiagnosticCode::DuplicateId,
                    &format!("{}.id", location::indexed("flows", i)),
                    format!("flow id {:?} declared more than once", flow.id),
                );
            }
        }
    }

    let mut group_ids = IndexSet::new();
    for (i, group) in groups.iter().enumerate() {
        let Some(group) = group else { continue };
        let loc = location::indexed("multicast", i);
        if !group_ids.insert(group.id) {
            out.cross(
                DiagnosticCode::DuplicateId,
                &join(&loc, "id"),
                format!("multicast group {} declared more than once", group.id),
            );
        }
        let mut seen = IndexSet::new();
        for member in &group.members {
            if !seen.insert(member.as_str()) {
                out.cross(
                    DiagnosticCode::DuplicateId,
                    &join(&loc, "members"),
                    format!("member {:?} listed more than once", member),
                );
            }
        }
        if group.replicas as usize > group.members.len() {
            out.cross(
                DiagnosticCode::ReplicasExceedMembers,
                &join(&loc, "replicas"),
                format!(
                    "{} replicas requested but only {} members declared",
                    group.replicas,
                    group.members.len()
                ),
            );
        }
    }

    let mut meter_ids = IndexSet::new();
    for (i, meter) in meters.iter().enumerate() {
        let Some(meter) = meter else { continue };
        let loc = location::indexed("meters", i);
        if !meter_ids.insert(meter.id.as_str()) {
            out.cross(
                DiagnosticCode::DuplicateId,
                &join(&loc, "id"),
                format!("meter id {:?} declared more than once", meter.id),
            );
        }
        if let Some(flow) = &meter.flow {
            // Only resolvable when every flow parsed; otherwise the flow
            // diagnostics already explain the failure.
            if flows.iter().all(Option::is_some) && !flow_ids.contains(flow.as_str()) {
                out.cross(
                    DiagnosticCode::UnknownReference,
                    &join(&loc, "flow"),
                    format!("meter references undeclared flow {:?}", flow),
                );
            }
        }
    }
}

fn join(loc: &str, field: &str) -> String {
    if loc == "$" {
        field.to_string()
    } else {
        format!("{}.{}", loc, field)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_object<'a>(value: &'a Value, loc: &str, out: &mut Findings) -> Option<&'a Map<String, Value>> {
    let obj = value.as_object();
    if obj.is_none() {
        out.structural(
            DiagnosticCode::InvalidType,
            loc,
            format!("expected object, found {}", type_name(value)),
        );
    }
    obj
}

fn missing(loc: &str, out: &mut Findings) {
    out.structural(
        DiagnosticCode::MissingField,
        loc,
        "required field is missing".to_string(),
    );
}

fn wrong_type(loc: &str, expected: &str, found: &Value, out: &mut Findings) {
    out.structural(
        DiagnosticCode::InvalidType,
        loc,
        format!("expected {}, found {}", expected, type_name(found)),
    );
}

fn req_str(obj: &Map<String, Value>, key: &str, loc: &str, out: &mut Findings) -> Option<String> {
    let field = join(loc, key);
    match obj.get(key) {
        None => {
            missing(&field, out);
            None
        }
        Some(v) => string_value(v, &field, out),
    }
}

fn opt_str(obj: &Map<String, Value>, key: &str, loc: &str, out: &mut Findings) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => string_value(v, &join(loc, key), out),
    }
}

fn string_value(value: &Value, field: &str, out: &mut Findings) -> Option<String> {
    match value.as_str() {
        Some(s) if s.trim().is_empty() => {
            out.range(DiagnosticCode::OutOfRange, field, "must not be empty".to_string());
            None
        }
        Some(s) => Some(s.to_string()),
        None => {
            wrong_type(field, "string", value, out);
            None
        }
    }
}

fn req_number(obj: &Map<String, Value>, key: &str, loc: &str, out: &mut Findings) -> Option<f64> {
    let field = join(loc, key);
    match obj.get(key) {
        None => {
            missing(&field, out);
            None
        }
        Some(v) => number_value(v, &field, out),
    }
}

/// `None` on a type error, `Some(None)` when absent
fn opt_number(
    obj: &Map<String, Value>,
    key: &str,
    loc: &str,
    out: &mut Findings,
) -> Option<Option<f64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(v) => number_value(v, &join(loc, key), out).map(Some),
    }
}

fn number_value(value: &Value, field: &str, out: &mut Findings) -> Option<f64> {
    match value.as_f64() {
        Some(n) if n.is_finite() => Some(n),
        _ => {
            wrong_type(field, "number", value, out);
            None
        }
    }
}

fn req_uint(obj: &Map<String, Value>, key: &str, loc: &str, out: &mut Findings) -> Option<u64> {
    let field = join(loc, key);
    match obj.get(key) {
        None => {
            missing(&field, out);
            None
        }
        Some(v) => uint_value(v, &field, out),
    }
}

fn opt_uint(obj: &Map<String, Value>, key: &str, loc: &str, out: &mut Findings) -> Option<u64> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => uint_value(v, &join(loc, key), out),
    }
}

fn uint_value(value: &Value, field: &str, out: &mut Findings) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if value.is_number() {
        out.range(
            DiagnosticCode::OutOfRange,
            field,
            format!("{} is not a non-negative integer", value),
        );
    } else {
        wrong_type(field, "integer", value, out);
    }
    None
}

/// `None` on a type error, `Some(None)` when absent
fn opt_bool(
    obj: &Map<String, Value>,
    key: &str,
    loc: &str,
    out: &mut Findings,
) -> Option<Option<bool>> {
    match obj.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::Bool(b)) => Some(Some(*b)),
        Some(v) => {
            wrong_type(&join(loc, key), "boolean", v, out);
            None
        }
    }
}

fn req_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    loc: &str,
    out: &mut Findings,
) -> Option<&'a Vec<Value>> {
    let field = join(loc, key);
    match obj.get(key) {
        None => {
            missing(&field, out);
            None
        }
        Some(Value::Array(items)) => Some(items),
        Some(v) => {
            wrong_type(&field, "array", v, out);
            None
        }
    }
}

fn opt_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    loc: &str,
    out: &mut Findings,
) -> Option<&'a Vec<Value>> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(items),
        Some(v) => {
            wrong_type(&join(loc, key), "array", v, out);
            None
        }
    }
}

fn positive_rate(mbps: f64, field: &str, out: &mut Findings) -> Option<Rate> {
    match Rate::from_mbps_f64(mbps) {
        Some(rate) if rate > Rate::ZERO => Some(rate),
        _ => {
            out.range(
                DiagnosticCode::OutOfRange,
                field,
                format!("rate {} Mbps must be positive", mbps),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "id": "s1_unicast_qos",
            "flows": [{
                "id": "f1",
                "src": "10.0.0.1",
                "dst": "10.0.0.3",
                "port": "eth0",
                "dst_port": 5001,
                "priority": "medium",
                "bandwidth": {"min_mbps": 5.0, "max_mbps": 6.0},
                "latency_max_ms": 30
            }]
        })
    }

    fn codes(diags: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diags.iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_validate_minimal() {
        let spec = Validator::new().validate(&minimal()).unwrap();
        assert_eq!(spec.id, "s1_unicast_qos");
        assert_eq!(spec.version, SchemaVersion::CURRENT);
        assert_eq!(spec.flows.len(), 1);
        let flow = &spec.flows[0];
        assert_eq!(flow.priority, PriorityTier::Medium);
        assert_eq!(flow.bandwidth.min, Rate::from_kbps(5_000));
        assert_eq!(flow.dst_port, Some(5001));
        assert!(!spec.requirements.atomic_commit);
    }

    #[test]
    fn test_not_an_object() {
        let diags = Validator::new().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(codes(&diags), vec![DiagnosticCode::InvalidType]);
        assert_eq!(diags[0].location, "$");
    }

    #[test]
    fn test_all_violations_reported() {
        let doc = json!({
            "id": "bad",
            "flows": [
                {"id": "f1", "src": "a", "dst": "b", "port": "eth0", "priority": "urgent",
                 "bandwidth": {"min_mbps": 9, "max_mbps": 6}, "latency_max_ms": -1},
                {"id": "f2", "src": "a", "dst": "b", "port": "eth1", "priority": "low",
                 "bandwidth": {"min_mbps": 1, "max_mbps": 2}, "latency_max_ms": 5},
                {"id": "f2", "src": "a", "dst": "b", "port": "eth1", "priority": "low",
                 "bandwidth": {"min_mbps": 1, "max_mbps": 2}, "latency_max_ms": 5}
            ]
        });
        let diags = Validator::new().validate(&doc).unwrap_err();
        let codes = codes(&diags);
        assert!(codes.contains(&DiagnosticCode::UnknownPriority));
        assert!(codes.contains(&DiagnosticCode::BandwidthRange));
        assert!(codes.contains(&DiagnosticCode::NegativeLatency));
        assert!(codes.contains(&DiagnosticCode::DuplicateId));
        assert!(diags.iter().all(|d| d.severity == l2i_core::Severity::Fatal));
    }

    #[test]
    fn test_passes_are_ordered() {
        let doc = json!({
            "id": "bad",
            "flows": [
                {"id": "f1", "src": "a", "dst": "b", "port": "eth0", "priority": "low",
                 "bandwidth": {"min_mbps": 9, "max_mbps": 6}, "latency_max_ms": 1},
                {"id": "f2", "dst": "b", "port": "eth0", "priority": "low",
                 "bandwidth": {"min_mbps": 1, "max_mbps": 2}, "latency_max_ms": 1}
            ]
        });
        let diags = Validator::new().validate(&doc).unwrap_err();
        // structural (missing src on f2) precedes the range problem on f1
        assert_eq!(
            codes(&diags),
            vec![DiagnosticCode::MissingField, DiagnosticCode::BandwidthRange]
        );
        assert_eq!(diags[0].location, "flows[1].src");
    }

    #[test]
    fn test_replicas_exceed_members() {
        let mut doc = minimal();
        doc["multicast"] = json!([{"id": 7, "members": ["eth0"], "replicas": 3}]);
        let diags = Validator::new().validate(&doc).unwrap_err();
        assert_eq!(codes(&diags), vec![DiagnosticCode::ReplicasExceedMembers]);
        assert_eq!(diags[0].location, "multicast[0].replicas");
    }

    #[test]
    fn test_meter_unknown_flow() {
        let mut doc = minimal();
        doc["meters"] = json!([{"id": "m1", "flow": "f9", "rate_mbps": 10}]);
        let diags = Validator::new().validate(&doc).unwrap_err();
        assert_eq!(codes(&diags), vec![DiagnosticCode::UnknownReference]);
    }

    #[test]
    fn test_wrong_types() {
        let doc = json!({
            "id": 5,
            "flows": "none",
            "requirements": {"atomic_commit": "yes"}
        });
        let diags = Validator::new().validate(&doc).unwrap_err();
        assert_eq!(
            codes(&diags),
            vec![
                DiagnosticCode::InvalidType,
                DiagnosticCode::InvalidType,
                DiagnosticCode::InvalidType
            ]
        );
    }

    #[test]
    fn test_unsupported_version() {
        let mut doc = minimal();
        doc["version"] = json!("2.0");
        let diags = Validator::new().validate(&doc).unwrap_err();
        assert_eq!(codes(&diags), vec![DiagnosticCode::UnsupportedVersion]);
    }

    #[test]
    fn test_empty_intent() {
        let diags = Validator::new()
            .validate(&json!({"id": "x", "flows": []}))
            .unwrap_err();
        assert_eq!(codes(&diags), vec![DiagnosticCode::EmptyIntent]);
    }

    #[test]
    fn test_multicast_only_intent() {
        let doc = json!({
            "id": "s2_multicast_source_oriented",
            "flows": [],
            "multicast": [{"id": 1, "members": ["p1", "p2"], "replicas": 2, "mode": "dynamic",
                           "address": "239.1.1.1"}],
            "requirements": {"telemetry": ["delivery_ratio"], "max_negotiation_rounds": 5}
        });
        let spec = Validator::new().validate(&doc).unwrap();
        assert_eq!(spec.multicast[0].mode, GroupMode::Dynamic);
        assert!(spec
            .requirements
            .telemetry
            .contains(&TelemetryMetric::DeliveryRatio));
        assert_eq!(spec.requirements.max_negotiation_rounds, Some(5));
    }

    #[test]
    fn test_canonical_order() {
        let mut doc = minimal();
        let mut f0 = doc["flows"][0].clone();
        f0["id"] = json!("a0");
        doc["flows"].as_array_mut().unwrap().push(f0);
        let spec = Validator::new().validate(&doc).unwrap();
        assert_eq!(spec.flows[0].id, "a0");
        assert_eq!(spec.flows[1].id, "f1");
    }

    #[test]
    fn test_flow_limit() {
        let diags = Validator::new()
            .with_max_flows(0)
            .with_max_groups(1)
            .validate(&minimal());
        assert!(diags.is_ok());
        let mut doc = minimal();
        doc["multicast"] = json!([
            {"id": 1, "members": ["eth0"], "replicas": 1},
            {"id": 2, "members": ["eth0"], "replicas": 1}
        ]);
        let diags = Validator::new().with_max_groups(1).validate(&doc).unwrap_err();
        assert_eq!(codes(&diags), vec![DiagnosticCode::OutOfRange]);
    }

    proptest::proptest! {
        #[test]
        fn prop_validator_is_total(s in ".{0,64}", n in proptest::num::f64::ANY) {
            // arbitrary garbage must produce diagnostics, never a panic
            let doc = json!({"id": s, "flows": [{"bandwidth": {"min_mbps": n}}]});
            proptest::prop_assert!(Validator::new().validate(&doc).is_err());
        }
    }
}
