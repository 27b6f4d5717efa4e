use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::accumulate::ReadingAccumulator;
use crate::calibrate::Analyte;
use crate::error::PipelineError;

/// Header line of the raw acquisition log.
pub const RAW_LOG_HEADER: &str = "Time/s\tCh1/nA\tCh2/nA\tCh3/nA\tCh4/nA\tCh5/nA\tCh6/nA\tT/°C";

/// One parsed row of a stored raw capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawLogRow {
    pub elapsed_s: f64,
    pub currents_na: [f64; 6],
    pub temperature_c: f64,
}

/// Appends tab-separated raw frames under the fixed header.
pub struct RawLogWriter<W: Write> {
    writer: W,
}

impl RawLogWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> RawLogWriter<W> {
    pub fn new(mut writer: W) -> Result<Self, PipelineError> {
        writeln!(writer, "{RAW_LOG_HEADER}")?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, row: &RawLogRow) -> Result<(), PipelineError> {
        write!(self.writer, "{:.2}", row.elapsed_s)?;
        for current in row.currents_na {
            write!(self.writer, "\t{current:.3}")?;
        }
        writeln!(self.writer, "\t{:.3}", row.temperature_c)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads a stored raw capture back for replay through the calibration path.
/// Malformed rows are fatal for the run; calibration assumes clean framing
/// upstream.
pub fn read_raw_log(path: impl AsRef<Path>) -> Result<Vec<RawLogRow>, PipelineError> {
    let file = File::open(path)?;
    read_raw_log_from(BufReader::new(file))
}

pub fn read_raw_log_from(reader: impl BufRead) -> Result<Vec<RawLogRow>, PipelineError> {
    let mut rows = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let number = number + 1;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        if number == 1 && trimmed.starts_with("Time/s") {
            continue;
        }
        rows.push(parse_row(trimmed, number)?);
    }
    Ok(rows)
}

fn parse_row(line: &str, number: usize) -> Result<RawLogRow, PipelineError> {
    let malformed = |reason: String| PipelineError::MalformedCapture {
        line: number,
        reason,
    };
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 8 {
        return Err(malformed(format!(
            "expected 8 tab-separated fields, found {}",
            fields.len()
        )));
    }
    let mut values = [0.0f64; 8];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field
            .trim()
            .parse()
            .map_err(|_| malformed(format!("not a number: {field:?}")))?;
    }
    Ok(RawLogRow {
        elapsed_s: values[0],
        currents_na: [
            values[1], values[2], values[3], values[4], values[5], values[6],
        ],
        temperature_c: values[7],
    })
}

/// Writes step records (stepped mode output), one row per record.
pub struct StepLogWriter<W: Write> {
    writer: W,
}

impl StepLogWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> StepLogWriter<W> {
    pub fn new(mut writer: W) -> Result<Self, PipelineError> {
        let labels: Vec<&str> = Analyte::ALL.iter().map(|a| a.label()).collect();
        writeln!(writer, "{}", labels.join("\t"))?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, record: &crate::accumulate::StepRecord) -> Result<(), PipelineError> {
        let mut first = true;
        for analyte in Analyte::ALL {
            if !first {
                write!(self.writer, "\t")?;
            }
            first = false;
            // Ungated analytes leave their column empty.
            if let Some(value) = record.value(analyte) {
                write!(self.writer, "{value:.3}")?;
            }
        }
        writeln!(self.writer)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Dumps the per-channel reading logs as a value/index column pair per
/// analyte; the diagnostic table the bench operators work from.
pub fn write_reading_table(
    mut writer: impl Write,
    accumulator: &ReadingAccumulator,
) -> Result<(), PipelineError> {
    let mut header = Vec::new();
    for (i, analyte) in Analyte::ALL.iter().enumerate() {
        header.push(analyte.label().to_string());
        header.push(format!("Index{}", i + 1));
    }
    writeln!(writer, "{}", header.join("\t"))?;
    let logs = Analyte::ALL.map(|a| accumulator.readings(a));
    let depth = logs.iter().map(|l| l.len()).max().unwrap_or(0);
    for row in 0..depth {
        let mut fields = Vec::new();
        for log in &logs {
            match log.get(row) {
                Some(reading) => {
                    fields.push(format!("{:.3}", reading.value));
                    fields.push(reading.sample_index.to_string());
                }
                None => {
                    fields.push(String::new());
                    fields.push(String::new());
                }
            }
        }
        writeln!(writer, "{}", fields.join("\t"))?;
    }
    Ok(())
}
