/// The flat per-job record handed to the persistence layer.
///
/// This is the shape the downstream job database stores: one row per job,
/// keyed by job id, with the interesting accounting fields coerced to their
/// storage types and the two derived durations computed.  Nothing here knows
/// about SQL; the caller owns the schema and the upsert.
use crate::job::Job;

use anyhow::{anyhow, Result};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub job_name: String,
    pub queue_name: String,
    pub user_name: String,
    pub group_name: String,
    /// The accounting log carries no PI; downstream reporting uses the group.
    pub pi_name: String,
    /// Epoch seconds.
    pub start_time: i64,
    pub end_time: i64,
    /// Epoch seconds of job creation (`ctime`).
    pub submission_time: i64,
    pub eligible_time: i64,
    /// end - start, seconds.
    pub wall_time: i64,
    /// start - submission, seconds.
    pub wait_time: i64,
    /// From `Resource_List`; None when the request did not name them.
    pub node_count: Option<i64>,
    pub cpu_count: Option<i64>,
    pub gpu_count: Option<i64>,
    pub cpu_req: Option<i64>,
    pub mem_req: Option<String>,
    /// The `exec_vnode` value, verbatim.
    pub node_list: String,
}

impl JobSummary {
    pub fn from_job(job: &Job) -> Result<JobSummary> {
        let start = int_field(job, "start")?;
        let end = int_field(job, "end")?;
        let submission = int_field(job, "ctime")?;
        Ok(JobSummary {
            job_id: job.id().to_string(),
            job_name: str_field(job, "jobname")?,
            queue_name: str_field(job, "queue")?,
            user_name: str_field(job, "user")?,
            group_name: str_field(job, "group")?,
            pi_name: str_field(job, "group")?,
            start_time: start,
            end_time: end,
            submission_time: submission,
            eligible_time: int_field(job, "etime")?,
            wall_time: end - start,
            wait_time: start - submission,
            node_count: int_resource(job, "nodect")?,
            cpu_count: int_resource(job, "ncpus")?,
            gpu_count: int_resource(job, "ngpus")?,
            cpu_req: int_resource(job, "ncpus")?,
            mem_req: job.resource_list("mem").map(|v| v.to_string()),
            node_list: str_field(job, "exec_vnode")?,
        })
    }
}

// The tags read here are in Job's required set, but don't panic if handed
// something else.
fn str_field(job: &Job, tag: &str) -> Result<String> {
    Ok(job
        .field(tag)
        .ok_or_else(|| anyhow!("Job {}: missing required field `{tag}`", job.id()))?
        .to_string())
}

fn int_field(job: &Job, tag: &str) -> Result<i64> {
    let v = job
        .field(tag)
        .ok_or_else(|| anyhow!("Job {}: missing required field `{tag}`", job.id()))?;
    v.trim()
        .parse::<i64>()
        .map_err(|_| anyhow!("Job {}: field `{tag}` is not an integer: `{v}`", job.id()))
}

fn int_resource(job: &Job, tag: &str) -> Result<Option<i64>> {
    match job.resource_list(tag) {
        None => Ok(None),
        Some(v) => Ok(Some(v.trim().parse::<i64>().map_err(|_| {
            anyhow!(
                "Job {}: Resource_List.{tag} is not an integer: `{v}`",
                job.id()
            )
        })?)),
    }
}

#[cfg(test)]
fn sample_job() -> Job {
    let f = crate::fields::parse_fields(
        "90.pbs01",
        "user=alice group=hpc jobname=sim queue=gpu session=4321 run_count=1 \
         Exit_status=0 ctime=1000 qtime=1010 etime=1020 start=1200 end=4800 \
         exec_host=n001/0*8 exec_vnode=(n001:ncpus=8) \
         Resource_List.nodect=1 Resource_List.ncpus=8 Resource_List.mem=16gb",
    )
    .unwrap();
    Job::new("90.pbs01", f).unwrap()
}

// This tests:
//  - field mapping, the derived durations, and optional resource requests

#[test]
fn test_summary_from_job() {
    let s = JobSummary::from_job(&sample_job()).unwrap();
    assert!(s.job_id == "90.pbs01");
    assert!(s.user_name == "alice");
    assert!(s.pi_name == "hpc");
    assert!(s.wall_time == 3600);
    assert!(s.wait_time == 200);
    assert!(s.node_count == Some(1));
    assert!(s.cpu_count == Some(8));
    assert!(s.gpu_count == None);
    assert!(s.mem_req.as_deref() == Some("16gb"));
    assert!(s.node_list == "(n001:ncpus=8)");
}

// This tests:
//  - a non-numeric timestamp is an error naming the job and the tag

#[test]
fn test_summary_bad_int() {
    let f = crate::fields::parse_fields(
        "91.pbs01",
        "user=alice group=hpc jobname=sim queue=gpu session=4321 run_count=1 \
         Exit_status=0 ctime=1000 qtime=1010 etime=1020 start=soon end=4800 \
         exec_host=n001/0*8 exec_vnode=(n001:ncpus=8)",
    )
    .unwrap();
    let job = Job::new("91.pbs01", f).unwrap();
    let e = JobSummary::from_job(&job);
    assert!(e.is_err());
    assert!(e.unwrap_err().to_string().contains("`start`"));
}
