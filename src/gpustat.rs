/// Decoders for the packed per-node GPU telemetry values that the DCGM
/// integration plants in `resources_used.*_per_node_gpu` fields.
///
/// The packed format is
///
///   `node1:(gpu0:v0+gpu1:v1)+node2:(gpu0:v2)`
///
/// nodes separated by `)+` with a stray `)` left on the final node, devices
/// within a node separated by `+`, and each device entry split on the first
/// `:` into device id and raw reading.  There is no escaping.  Readings carry
/// a trailing unit token that differs per telemetry kind; decoding strips the
/// unit and, for durations, converts the number to hours.
use anyhow::{bail, Result};
use std::collections::HashMap;
use ustr::Ustr;

/// Raw (or unit-stripped) readings keyed by `"node:gpu"`.

pub type GpuReadings = HashMap<Ustr, String>;

/// The string-valued telemetry kinds.  Each differs only in the number of
/// trailing unit characters on a reading; durations are handled separately
/// because they decode to numbers.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuStat {
    /// `1500MHZ`
    ClockMhz,
    /// `1.5GB`
    MemoryGb,
    /// `231.4W`
    EnergyWatts,
    /// `87.5%`
    UtilizationPct,
}

impl GpuStat {
    fn suffix_len(self) -> usize {
        match self {
            GpuStat::ClockMhz => 3,
            GpuStat::MemoryGb => 2,
            GpuStat::EnergyWatts | GpuStat::UtilizationPct => 1,
        }
    }
}

/// Split a packed telemetry string into per-device raw readings, keyed by
/// `"node:gpu"`.  Fails on any structural violation; devices are never
/// silently dropped.

pub fn decode_per_device(packed: &str) -> Result<GpuReadings> {
    let mut out = HashMap::new();
    for chunk in packed.split(")+") {
        let chunk = chunk.trim();
        // The final chunk keeps its group-closing paren; strip it wherever it
        // shows up.
        let chunk = chunk.strip_suffix(')').unwrap_or(chunk);
        let Some((node, devices)) = chunk.split_once(":(") else {
            bail!("Bad per-node gpu stat `{packed}`: no `:(` in `{chunk}`");
        };
        for device in devices.split('+') {
            let Some((gpu, reading)) = device.split_once(':') else {
                bail!("Bad per-node gpu stat `{packed}`: no `:` in device entry `{device}`");
            };
            out.insert(
                Ustr::from(format!("{node}:{gpu}").as_str()),
                reading.to_string(),
            );
        }
    }
    Ok(out)
}

/// Decode a string-valued telemetry kind: split per device, then strip the
/// kind's unit suffix from each reading.

pub fn decode_gpu_stat(kind: GpuStat, packed: &str) -> Result<GpuReadings> {
    strip_suffixes(packed, kind.suffix_len())
}

/// Decode a duration telemetry value into hours per device.  Raw readings
/// end in `secs`, `mins` or `hrs`; stripping three characters leaves `s`,
/// `m` or nothing as the unit discriminator.  Hour readings get no scaling
/// (there is deliberately no `h` branch).

pub fn decode_gpu_duration_hours(packed: &str) -> Result<HashMap<Ustr, f64>> {
    let stripped = strip_suffixes(packed, 3)?;
    let mut out = HashMap::new();
    for (id, v) in stripped {
        let hours = if let Some(num) = v.strip_suffix('s') {
            parse_reading(num, packed)? / 3600.0
        } else if let Some(num) = v.strip_suffix('m') {
            parse_reading(num, packed)? / 60.0
        } else {
            parse_reading(&v, packed)?
        };
        out.insert(id, hours);
    }
    Ok(out)
}

fn strip_suffixes(packed: &str, n: usize) -> Result<GpuReadings> {
    let mut out = decode_per_device(packed)?;
    for v in out.values_mut() {
        strip_tail(v, n);
    }
    Ok(out)
}

// Remove the last n characters; a reading shorter than its unit suffix
// becomes empty.
fn strip_tail(v: &mut String, n: usize) {
    match v.char_indices().rev().nth(n - 1) {
        Some((ix, _)) => v.truncate(ix),
        None => v.clear(),
    }
}

fn parse_reading(s: &str, packed: &str) -> Result<f64> {
    match s.parse::<f64>() {
        Ok(n) => Ok(n),
        Err(_) => bail!("Bad numeric gpu reading `{s}` in `{packed}`"),
    }
}

// This tests:
//  - clock readings across devices of a single node, trailing paren stripped

#[test]
fn test_gpustat_clock() {
    let r = decode_gpu_stat(GpuStat::ClockMhz, "nodeA:(gpu0:1500MHZ+gpu1:1600MHZ)").unwrap();
    assert!(r.len() == 2);
    assert!(r[&Ustr::from("nodeA:gpu0")] == "1500");
    assert!(r[&Ustr::from("nodeA:gpu1")] == "1600");
}

// This tests:
//  - multi-node decode with the `)+` node separator

#[test]
fn test_gpustat_multi_node() {
    let r = decode_gpu_stat(GpuStat::EnergyWatts, "nodeA:(gpu0:10W)+nodeB:(gpu0:20W)").unwrap();
    assert!(r.len() == 2);
    assert!(r[&Ustr::from("nodeA:gpu0")] == "10");
    assert!(r[&Ustr::from("nodeB:gpu0")] == "20");
}

// This tests:
//  - the remaining string-valued suffix lengths

#[test]
fn test_gpustat_suffixes() {
    let r = decode_gpu_stat(GpuStat::MemoryGb, "n1:(gpu0:1.5GB)").unwrap();
    assert!(r[&Ustr::from("n1:gpu0")] == "1.5");
    let r = decode_gpu_stat(GpuStat::UtilizationPct, "n1:(gpu0:87.5%)").unwrap();
    assert!(r[&Ustr::from("n1:gpu0")] == "87.5");
}

// This tests:
//  - duration conversion: seconds and minutes to hours, hour readings
//    passed through unscaled

#[test]
fn test_gpustat_duration() {
    let r = decode_gpu_duration_hours("nodeA:(gpu0:90.0secs)").unwrap();
    assert!(r[&Ustr::from("nodeA:gpu0")] == 0.025);
    let r = decode_gpu_duration_hours("nodeA:(gpu0:30.0mins)").unwrap();
    assert!(r[&Ustr::from("nodeA:gpu0")] == 0.5);
    let r = decode_gpu_duration_hours("nodeA:(gpu0:2.5hrs)").unwrap();
    assert!(r[&Ustr::from("nodeA:gpu0")] == 2.5);
}

// This tests:
//  - structural violations fail loudly

#[test]
fn test_gpustat_malformed() {
    // No `:(` anywhere
    assert!(decode_per_device("gpu0:100W").is_err());
    // Device entry without `:`
    assert!(decode_per_device("nodeA:(gpu0)").is_err());
    // Empty string is not a decodable telemetry value
    assert!(decode_per_device("").is_err());
    // Duration with a garbage number
    assert!(decode_gpu_duration_hours("nodeA:(gpu0:whatsecs)").is_err());
}
