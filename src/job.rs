/// The Job entity: one completed job, as described by one E record.
use crate::fields::FieldMap;

use anyhow::{bail, Result};
use ustr::Ustr;

// Top-level tags that must be present for the record to be usable downstream.
// Checked in this order; the first absent one is reported.
const REQUIRED_FIELDS: [&str; 14] = [
    "user",
    "exec_host",
    "exec_vnode",
    "group",
    "end",
    "start",
    "ctime",
    "qtime",
    "etime",
    "Exit_status",
    "queue",
    "jobname",
    "session",
    "run_count",
];

/// A Job pairs the job id from the log line with the tokenized field map of
/// its E record.  Construction validates that the required top-level tags are
/// present; the `Resource_List` and `resources_used` namespaces are present
/// in every FieldMap by construction.  A Job is read-only once built and owns
/// its FieldMap exclusively.

#[derive(Debug, Clone)]
pub struct Job {
    id: Ustr,
    fields: FieldMap,
}

impl Job {
    pub fn new(id: &str, fields: FieldMap) -> Result<Job> {
        for tag in REQUIRED_FIELDS {
            if fields.get(tag).is_none() {
                bail!("Job {id}: missing required field `{tag}`");
            }
        }
        Ok(Job {
            id: Ustr::from(id),
            fields,
        })
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Look up a top-level tag.

    pub fn field(&self, tag: &str) -> Option<&str> {
        self.fields.get(tag)
    }

    /// Look up a sub-tag of `resources_used`.

    pub fn resource_used(&self, tag: &str) -> Option<&str> {
        self.fields.resources_used(tag)
    }

    /// Look up a sub-tag of `Resource_List`.

    pub fn resource_list(&self, tag: &str) -> Option<&str> {
        self.fields.resource_list(tag)
    }
}

#[cfg(test)]
fn complete_fieldmap() -> FieldMap {
    crate::fields::parse_fields(
        "77.pbs01",
        "user=alice group=hpc jobname=sim queue=gpu session=4321 run_count=1 \
         Exit_status=0 ctime=100 qtime=101 etime=102 start=200 end=500 \
         exec_host=n001/0*8 exec_vnode=(n001:ncpus=8) \
         Resource_List.ncpus=8 resources_used.cput=00:05:00",
    )
    .unwrap()
}

// This tests:
//  - construction from a complete record, and the three accessor levels

#[test]
fn test_job_accessors() {
    let job = Job::new("77.pbs01", complete_fieldmap()).unwrap();
    assert!(job.id() == "77.pbs01");
    assert!(job.field("user") == Some("alice"));
    assert!(job.field("nonesuch") == None);
    assert!(job.resource_list("ncpus") == Some("8"));
    assert!(job.resource_used("cput") == Some("00:05:00"));
    assert!(job.resource_used("ncpus") == None);
}

// This tests:
//  - a missing required field fails construction and is named in the error

#[test]
fn test_job_missing_required() {
    let f = crate::fields::parse_fields(
        "78.pbs01",
        "group=hpc jobname=sim queue=gpu session=4321 run_count=1 \
         Exit_status=0 ctime=100 qtime=101 etime=102 start=200 end=500 \
         exec_host=n001/0*8 exec_vnode=(n001:ncpus=8)",
    )
    .unwrap();
    let e = Job::new("78.pbs01", f);
    assert!(e.is_err());
    assert!(e.unwrap_err().to_string().contains("`user`"));
}
