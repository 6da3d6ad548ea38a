//! Delimited text output for generated schedules.

use std::io::{self, Write};

use poisson_iti_core::IntervalSchedule;
use poisson_iti_system_blocks::SessionSchedule;
use poisson_iti_system_sampler::density::BinSummary;

/// Column names always emitted for a schedule.
const TIME_COLUMNS: &str = "iti,time";
/// Column names appended when frame indices are present.
const FRAME_COLUMNS: &str = "frame.iti,frame.idx";

/// Writes one row per trial with the interval and onset at five decimals,
/// followed by the frame columns when the schedule carries them.
pub(crate) fn write_schedule<W: Write>(out: &mut W, schedule: &IntervalSchedule) -> io::Result<()> {
    write_header(out, None, schedule.frames().is_some())?;
    write_rows(out, None, schedule)
}

/// Writes every block of a session, prefixing each row with its block index.
pub(crate) fn write_session<W: Write>(out: &mut W, session: &SessionSchedule) -> io::Result<()> {
    let framed = session
        .blocks()
        .first()
        .is_some_and(|block| block.frames().is_some());
    write_header(out, Some("block"), framed)?;
    for (index, block) in session.blocks().iter().enumerate() {
        write_rows(out, Some(index), block)?;
    }
    Ok(())
}

/// Writes the fitted density next to the target density, one row per bin.
pub(crate) fn write_histogram<W: Write>(out: &mut W, rows: &[BinSummary]) -> io::Result<()> {
    writeln!(out, "bin_start,bin_end,empirical,target")?;
    for row in rows {
        writeln!(
            out,
            "{:.5},{:.5},{:.5},{:.5}",
            row.start, row.end, row.empirical, row.target
        )?;
    }
    Ok(())
}

fn write_header<W: Write>(out: &mut W, prefix: Option<&str>, framed: bool) -> io::Result<()> {
    if let Some(prefix) = prefix {
        write!(out, "{prefix},")?;
    }
    write!(out, "{TIME_COLUMNS}")?;
    if framed {
        write!(out, ",{FRAME_COLUMNS}")?;
    }
    writeln!(out)
}

fn write_rows<W: Write>(
    out: &mut W,
    block: Option<usize>,
    schedule: &IntervalSchedule,
) -> io::Result<()> {
    for (row, (interval, onset)) in schedule
        .intervals()
        .iter()
        .zip(schedule.onsets())
        .enumerate()
    {
        if let Some(block) = block {
            write!(out, "{block},")?;
        }
        write!(out, "{interval:.5},{onset:.5}")?;
        if let Some(frames) = schedule.frames() {
            write!(out, ",{},{}", frames.intervals()[row], frames.onsets()[row])?;
        }
        writeln!(out)?;
    }
    Ok(())
}
