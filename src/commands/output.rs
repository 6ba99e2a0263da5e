use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use verifier_assign::AssignmentResult;

pub(crate) fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub(crate) fn write_assignment_text(results: &[AssignmentResult]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    for result in results {
        writeln!(
            output,
            "{} {} assigned=[{}]",
            result.report_id,
            result.outcome,
            result.assigned_ids.join(", ")
        )?;
        if !result.drifted_ids.is_empty() {
            writeln!(output, "  drifted=[{}]", result.drifted_ids.join(", "))?;
        }
        if let Some(detail) = &result.detail {
            writeln!(output, "  {detail}")?;
        }
    }

    output.flush()?;
    Ok(())
}

pub(crate) fn write_lines<I, S>(lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut output = io::BufWriter::new(io::stdout().lock());
    for line in lines {
        writeln!(output, "{}", line.as_ref())?;
    }
    output.flush()?;
    Ok(())
}
