/// Reader for PBS Pro accounting log files.
///
/// An accounting file holds one record per line, `timestamp;type;job_id;fields`.
/// Only E (end of job) records describe completed jobs; everything else, and
/// comment lines whose timestamp starts with `#`, is skipped.
///
/// NOTE:
///
/// - It's an important feature of this reader that a corrupted record is
///   dropped and counted rather than aborting the file.  Appending-to-log is
///   not atomic wrt reading-from-log, so a partly-written record at the tail
///   of a live log is a normal sight.
use crate::fields::parse_fields;
use crate::job::Job;

use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use std::io;
use std::io::BufRead;

/// Wallclock time of a log line, without timezone (the server logs local
/// time).

pub type Timestamp = NaiveDateTime;

/// Parse the line-leading timestamp, `mm/dd/yyyy hh:mm:ss`.

pub fn parse_timestamp(t: &str) -> Result<Timestamp> {
    Ok(NaiveDateTime::parse_from_str(t, "%m/%d/%Y %H:%M:%S")?)
}

/// Parse one accounting log line.  Returns Ok(None) for lines the core does
/// not consume (comments, non-E records), Ok(Some(job)) for a good E record,
/// and an error for a structurally bad line or record.

pub fn parse_record_line(line: &str) -> Result<Option<Job>> {
    if line.starts_with('#') {
        return Ok(None);
    }
    // Only the first three `;` delimit; the field blob may contain more.
    let mut parts = line.splitn(4, ';');
    let (Some(_timestamp), Some(record_type), Some(job_id), Some(blob)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("Accounting record is not `timestamp;type;id;fields`: `{line}`");
    };
    if record_type != "E" {
        return Ok(None);
    }
    let fields = parse_fields(job_id, blob)?;
    Ok(Some(Job::new(job_id, fields)?))
}

/// Parse an accounting log into a set of Jobs, appending to `jobs` in the
/// order encountered.  Return an error for I/O errors, but drop records with
/// parse errors.  Returns the number of dropped records.

pub fn parse_log(input: &mut dyn io::Read, jobs: &mut Vec<Job>) -> Result<usize> {
    let mut discarded = 0;
    for line in io::BufReader::new(input).lines() {
        match parse_record_line(&line?) {
            Ok(Some(job)) => jobs.push(job),
            Ok(None) => {}
            Err(_) => {
                discarded += 1;
            }
        }
    }
    Ok(discarded)
}

/// As `parse_log`, for a named file.

pub fn parse_logfile(file_name: &str, jobs: &mut Vec<Job>) -> Result<usize> {
    let mut file = std::fs::File::open(file_name)?;
    parse_log(&mut file, jobs)
}

#[cfg(test)]
const GOOD_BLOB: &str = "user=alice group=hpc jobname=sim queue=gpu session=4321 \
     run_count=1 Exit_status=0 ctime=100 qtime=101 etime=102 start=200 end=500 \
     exec_host=n001/0*8 exec_vnode=(n001:ncpus=8) Resource_List.ncpus=8";

// This tests:
//  - comment and non-E lines are skipped, E lines come back as Jobs

#[test]
fn test_logfile_line_dispatch() {
    assert!(parse_record_line("#comment;E;1.pbs01;whatever")
        .unwrap()
        .is_none());
    assert!(parse_record_line(&format!("10/01/2023 14:23:45;S;1.pbs01;{GOOD_BLOB}"))
        .unwrap()
        .is_none());
    let job = parse_record_line(&format!("10/01/2023 14:23:45;E;1.pbs01;{GOOD_BLOB}"))
        .unwrap()
        .unwrap();
    assert!(job.id() == "1.pbs01");
    assert!(job.field("user") == Some("alice"));
    assert!(job.resource_list("ncpus") == Some("8"));
}

// This tests:
//  - structurally bad lines are errors at the line level

#[test]
fn test_logfile_bad_line() {
    assert!(parse_record_line("not a record at all").is_err());
    assert!(parse_record_line("10/01/2023 14:23:45;E").is_err());
}

// This tests:
//  - whole-log parsing: good records collected, torn record counted and
//    dropped, skipped lines not counted

#[test]
fn test_logfile_parse_log() {
    let text = format!(
        "#version 1.0\n\
         10/01/2023 14:23:45;E;1.pbs01;{GOOD_BLOB}\n\
         10/01/2023 14:23:46;Q;2.pbs01;queue=gpu\n\
         10/01/2023 14:23:47;E;3.pbs01;group=hpc jobname=torn\n\
         10/01/2023 14:23:48;E;4.pbs01;{GOOD_BLOB}\n"
    );
    let mut bs = text.as_bytes();
    let mut jobs = vec![];
    let discarded = parse_log(&mut bs, &mut jobs).unwrap();
    assert!(discarded == 1);
    assert!(jobs.len() == 2);
    assert!(jobs[0].id() == "1.pbs01");
    assert!(jobs[1].id() == "4.pbs01");
}

// This tests:
//  - the line timestamp format

#[test]
fn test_logfile_timestamp() {
    let t = parse_timestamp("10/01/2023 14:23:45").unwrap();
    assert!(t == chrono::NaiveDate::from_ymd_opt(2023, 10, 1)
        .unwrap()
        .and_hms_opt(14, 23, 45)
        .unwrap());
    assert!(parse_timestamp("2023-10-01T14:23:45").is_err());
}
