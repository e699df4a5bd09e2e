use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use log::info;
use serde::Serialize;

use crate::PitwallError;

/// Writes a result as one JSON document to `output`, or to stdout when no
/// file is given.
pub fn write_result<T: Serialize>(
    result: &T,
    output: Option<&Path>,
    pretty: bool,
) -> Result<(), PitwallError> {
    match output {
        Some(output_file) => {
            let file =
                File::create(output_file).map_err(|e| PitwallError::WriterError { source: e })?;
            write_json(BufWriter::new(file), result, pretty)?;
            info!("Wrote result to {:?}", output_file);
            Ok(())
        }
        None => write_json(io::stdout().lock(), result, pretty),
    }
}

pub fn write_json<W: Write, T: Serialize>(
    mut writer: W,
    result: &T,
    pretty: bool,
) -> Result<(), PitwallError> {
    let serialized = if pretty {
        serde_json::to_writer_pretty(&mut writer, result)
    } else {
        serde_json::to_writer(&mut writer, result)
    };
    serialized.map_err(|e| PitwallError::ResultSerializeError { source: e })?;
    writeln!(writer).map_err(|e| PitwallError::WriterError { source: e })?;
    writer
        .flush()
        .map_err(|e| PitwallError::WriterError { source: e })
}
