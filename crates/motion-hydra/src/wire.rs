//! Hydra wire protocol: request formatting and response parsing.
//!
//! Requests are `"<axis> <verb> [arg]\n"`. Every request gets exactly
//! one response line: a value for `?`-suffixed query verbs, `ok` for
//! commands, or `err <reason>` when the controller refuses.

use motion_core::{MotionError, MotionResult, Switches};

pub(crate) const STATUS_MOVING: u32 = 0x01;
pub(crate) const STATUS_ENABLED: u32 = 0x02;
pub(crate) const STATUS_INITIALIZED: u32 = 0x04;
pub(crate) const STATUS_READY: u32 = 0x08;

pub(crate) fn cmd(axis: u32, verb: &str) -> String {
    format!("{axis} {verb}\n")
}

pub(crate) fn cmd_f64(axis: u32, verb: &str, value: f64) -> String {
    format!("{axis} {verb} {value}\n")
}

pub(crate) fn cmd_flag(axis: u32, verb: &str, on: bool) -> String {
    format!("{axis} {verb} {}\n", u8::from(on))
}

/// A command response: `ok`, or `err <reason>`.
pub(crate) fn expect_ok(resp: &str) -> MotionResult<()> {
    let resp = resp.trim();
    if resp == "ok" {
        return Ok(());
    }
    if let Some(reason) = resp.strip_prefix("err ") {
        return Err(MotionError::Protocol(format!(
            "controller refused command: {reason}"
        )));
    }
    Err(MotionError::Protocol(format!(
        "expected ok, got {resp:?}"
    )))
}

pub(crate) fn parse_f64(resp: &str) -> MotionResult<f64> {
    resp.trim()
        .parse::<f64>()
        .map_err(|_| MotionError::Protocol(format!("expected a number, got {resp:?}")))
}

/// Decoded `status?` bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusWord {
    pub moving: bool,
    pub enabled: bool,
    pub initialized: bool,
    pub ready: bool,
}

pub(crate) fn parse_status(resp: &str) -> MotionResult<StatusWord> {
    let bits = resp
        .trim()
        .parse::<u32>()
        .map_err(|_| MotionError::Protocol(format!("bad status word {resp:?}")))?;
    Ok(StatusWord {
        moving: bits & STATUS_MOVING != 0,
        enabled: bits & STATUS_ENABLED != 0,
        initialized: bits & STATUS_INITIALIZED != 0,
        ready: bits & STATUS_READY != 0,
    })
}

/// A `switch?` response: three 0/1 fields, `<upper> <lower> <index>`.
pub(crate) fn parse_switches(resp: &str) -> MotionResult<Switches> {
    let mut fields = resp.split_whitespace().map(|f| match f {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(MotionError::Protocol(format!(
            "bad switch field {other:?} in {resp:?}"
        ))),
    });
    let mut next = |name: &str| {
        fields.next().transpose()?.ok_or_else(|| {
            MotionError::Protocol(format!("missing {name} switch field in {resp:?}"))
        })
    };
    Ok(Switches {
        at_upper_limit: next("upper")?,
        at_lower_limit: next("lower")?,
        index_found: next("index")?,
    })
}
