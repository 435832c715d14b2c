/// pbslog parses PBS Pro accounting logs.  An accounting log holds one
/// record per line, `timestamp;record_type;job_id;field_blob`; the E
/// (end-of-job) records carry the complete accounting picture of a finished
/// job and are the only records this library consumes.
///
/// The field blob is a loosely delimited collection of `tag=value` pairs
/// with two dotted namespaces (`Resource_List`, `resources_used`) holding an
/// open-ended set of sub-keys.  Tokenizing it is a heuristic, known-name
/// driven scan; see fields.rs for the gory details.  Some `resources_used`
/// sub-keys hold packed per-node GPU telemetry from the DCGM integration;
/// see gpustat.rs for the decoders.
///
/// Scanning directories for log files and persisting the parsed jobs belong
/// to the callers of this library.
mod fields;
mod gpustat;
mod job;
mod logfile;
mod summary;

// Tokenize one record's field blob into a FieldMap.

pub use fields::parse_fields;

// The tokenized form of a field blob: a flat tag map plus the two reserved
// namespace maps.

pub use fields::FieldMap;

// Split a packed per-node telemetry string into raw readings per "node:gpu".

pub use gpustat::decode_per_device;

// Decode a string-valued telemetry kind (clock, memory, energy, utilization).

pub use gpustat::decode_gpu_stat;
pub use gpustat::GpuStat;

// Decode a duration telemetry value into hours per "node:gpu".

pub use gpustat::decode_gpu_duration_hours;

// Readings keyed by "node:gpu".

pub use gpustat::GpuReadings;

// One completed job: the job id plus its validated FieldMap.

pub use job::Job;

// Parse one accounting log line, skipping comments and non-E records.

pub use logfile::parse_record_line;

// Parse a whole accounting log into Jobs, dropping and counting torn records.

pub use logfile::parse_log;
pub use logfile::parse_logfile;

// The line-leading wallclock timestamp.

pub use logfile::parse_timestamp;
pub use logfile::Timestamp;

// The flat per-job record handed to the persistence layer.

pub use summary::JobSummary;
