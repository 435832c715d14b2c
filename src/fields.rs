/// Tokenizer for the field blob of a PBS Pro accounting record.
///
/// An accounting line has the shape `timestamp;type;job_id;fields` and the
/// `fields` part is one long blob of `tag=value` pairs.  There is no reliable
/// delimiter between the pairs: values may contain spaces, `=`, `+`, parens
/// and so on (`exec_vnode` is the usual offender).  Field boundaries must
/// therefore be inferred from a list of known tag names plus the two dynamic
/// `Resource_List.<name>=` / `resources_used.<name>=` families.
///
/// NOTE:
///
/// - The boundary scan is heuristic.  If a value literally contains the bytes
///   `" knownname="` the scan will split inside that value.  This mirrors the
///   behavior of the tooling that has historically consumed these logs and is
///   normative; a stricter grammar would disagree with it on real log data.
///
/// - Anything in the blob before the first recognized tag is dropped, also
///   normative.
use anyhow::{bail, Result};
use itertools::Itertools;
use regex::Regex;
use std::collections::HashMap;
use std::iter::once;
use std::sync::OnceLock;
use ustr::Ustr;

// The "simple" tags an E record may carry at top level.  Dotted resource tags
// are matched by the regex families instead.
const KNOWN_FIELDS: [&str; 25] = [
    "account",
    "accounting_id",
    "alt_id",
    "array_indices",
    "ctime",
    "eligible_time",
    "end",
    "etime",
    "exec_host",
    "exec_vnode",
    "Exit_status",
    "group",
    "jobname",
    "pcap_accelerator",
    "pcap_node",
    "pgov",
    "project",
    "qtime",
    "queue",
    "resvID",
    "resvname",
    "run_count",
    "session",
    "start",
    "user",
];

fn resources_used_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" resources_used\.\w+=").unwrap())
}

fn resource_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" Resource_List\.\w+=").unwrap())
}

/// The parsed form of one record's field blob: a flat tag -> value map, plus
/// the two reserved `Resource_List` and `resources_used` namespaces as nested
/// maps (one level only).  The namespaces are present, possibly empty, in
/// every FieldMap.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    simple: HashMap<Ustr, String>,
    resource_list: HashMap<Ustr, String>,
    resources_used: HashMap<Ustr, String>,
}

impl FieldMap {
    /// Look up a top-level tag.

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.simple.get(&Ustr::from(tag)).map(|v| v.as_str())
    }

    /// Look up a sub-tag of the `Resource_List` namespace.

    pub fn resource_list(&self, tag: &str) -> Option<&str> {
        self.resource_list.get(&Ustr::from(tag)).map(|v| v.as_str())
    }

    /// Look up a sub-tag of the `resources_used` namespace.

    pub fn resources_used(&self, tag: &str) -> Option<&str> {
        self.resources_used
            .get(&Ustr::from(tag))
            .map(|v| v.as_str())
    }

    // File one raw `tag=value` span.  The span still carries the leading
    // space (or nothing, for a first field found by the semicolon fallback);
    // only the tag side is trimmed, the value is kept byte for byte.
    fn insert_entry(&mut self, job_id: &str, entry: &str) -> Result<()> {
        let Some((tag, value)) = entry.split_once('=') else {
            bail!(
                "Job {job_id}: field entry `{}` has no `=` separator",
                entry.trim()
            );
        };
        let tag = tag.trim();
        match tag.split_once('.') {
            Some(("Resource_List", sub)) => {
                self.resource_list.insert(Ustr::from(sub), value.to_string());
            }
            Some(("resources_used", sub)) => {
                self.resources_used.insert(Ustr::from(sub), value.to_string());
            }
            _ => {
                self.simple.insert(Ustr::from(tag), value.to_string());
            }
        }
        Ok(())
    }
}

/// Tokenize the field blob of one E record into a FieldMap.  `job_id` is used
/// only for error context.  A blob in which nothing is recognized yields a
/// FieldMap with empty maps; a recognized span without `=` is an error.

pub fn parse_fields(job_id: &str, blob: &str) -> Result<FieldMap> {
    let mut offsets = vec![];

    // In the original line the first field is preceded by the `;` that ended
    // the job id rather than by a space.  Probing a ";"-prefixed copy of the
    // blob makes the match position the correct blob offset in both the
    // leading-field and the interior case.
    let semi_blob = format!(";{blob}");
    let mut probe = String::new();
    for tag in KNOWN_FIELDS {
        probe.clear();
        probe.push(' ');
        probe.push_str(tag);
        probe.push('=');
        if let Some(ix) = blob.find(&probe) {
            offsets.push(ix);
            continue;
        }
        probe.replace_range(0..1, ";");
        if let Some(ix) = semi_blob.find(&probe) {
            offsets.push(ix);
        }
    }
    for m in resources_used_re().find_iter(blob) {
        offsets.push(m.start());
    }
    for m in resource_list_re().find_iter(blob) {
        offsets.push(m.start());
    }
    offsets.sort_unstable();

    // Each span between consecutive offsets is one raw `tag=value` entry; the
    // final span runs to the end of the blob.
    let mut fields = FieldMap::default();
    for (start, lim) in offsets
        .into_iter()
        .chain(once(blob.len()))
        .tuple_windows()
    {
        fields.insert_entry(job_id, &blob[start..lim])?;
    }
    Ok(fields)
}

// This tests:
//  - simple known-tag recovery, with the first field matched through the
//    semicolon fallback (no leading space on `user=`)
//  - a value containing `=` is split on the first `=` only

#[test]
fn test_fields_known_tags() {
    let f = parse_fields(
        "1.pbs01",
        "user=alice group=hpc queue=batch Exit_status=0 \
         exec_vnode=(n001:ncpus=8:mem=4kb)+(n002:ncpus=8:mem=4kb)",
    )
    .unwrap();
    assert!(f.get("user") == Some("alice"));
    assert!(f.get("group") == Some("hpc"));
    assert!(f.get("queue") == Some("batch"));
    assert!(f.get("Exit_status") == Some("0"));
    assert!(f.get("exec_vnode") == Some("(n001:ncpus=8:mem=4kb)+(n002:ncpus=8:mem=4kb)"));
    assert!(f.get("jobname") == None);
}

// This tests:
//  - dotted tags land in the namespace maps, not at top level

#[test]
fn test_fields_namespaces() {
    let f = parse_fields("1.pbs01", "Resource_List.ncpus=4 resources_used.mem=512mb").unwrap();
    assert!(f.resource_list("ncpus") == Some("4"));
    assert!(f.resources_used("mem") == Some("512mb"));
    assert!(f.get("ncpus") == None);
    assert!(f.get("mem") == None);
    assert!(f.get("Resource_List.ncpus") == None);
}

// This tests:
//  - tokenizing the same blob twice yields structurally equal maps

#[test]
fn test_fields_idempotent() {
    let blob = "user=bob queue=gpu Resource_List.ngpus=2 resources_used.cput=01:00:00";
    let a = parse_fields("2.pbs01", blob).unwrap();
    let b = parse_fields("2.pbs01", blob).unwrap();
    assert!(a == b);
}

// This tests:
//  - an empty blob is not an error, it is just empty

#[test]
fn test_fields_empty_blob() {
    let f = parse_fields("3.pbs01", "").unwrap();
    assert!(f == FieldMap::default());
}

// This tests:
//  - junk before the first recognized tag is dropped

#[test]
fn test_fields_junk_prefix() {
    let f = parse_fields("4.pbs01", "garbage here user=carol queue=debug").unwrap();
    assert!(f.get("user") == Some("carol"));
    assert!(f.get("queue") == Some("debug"));
    assert!(f.get("garbage") == None);
}

// This tests:
//  - the normative mis-split: a value containing `" knownname="` loses its
//    tail to a false boundary

#[test]
fn test_fields_false_boundary() {
    let f = parse_fields("5.pbs01", "jobname=run with user=me queue=batch").unwrap();
    assert!(f.get("jobname") == Some("run with"));
    assert!(f.get("user") == Some("me"));
    assert!(f.get("queue") == Some("batch"));
}

// This tests:
//  - a span with no `=` separator fails tokenization instead of being
//    silently dropped

#[test]
fn test_fields_malformed_entry() {
    let mut f = FieldMap::default();
    assert!(f.insert_entry("6.pbs01", " user=ok").is_ok());
    let e = f.insert_entry("6.pbs01", " truncated garbage");
    assert!(e.is_err());
    assert!(e.unwrap_err().to_string().contains("truncated garbage"));
}
