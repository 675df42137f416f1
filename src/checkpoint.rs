//! Weight checkpoints.
//!
//! Plain text, two lines per layer, layers in network order:
//!
//! ```text
//! <out*in weights, row-major, space separated>
//! <out biases, space separated>
//! ```
//!
//! Values are written in Rust's shortest round-trip exponential form (`{:e}`, e.g.
//! `1.045e1`), which parses back to the identical `f32` bits. Plain decimal literals are
//! accepted on read, so hand-written files work too.
//!
//! The file carries no shapes: it is read into a network whose architecture is already
//! known. Every count is validated before any layer is modified.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::{Error, Layer, Network, Result};

/// Write one layer's weights and biases.
pub fn write_layer<W: Write>(w: &mut W, layer: &Layer) -> std::io::Result<()> {
    write_values(w, layer.weights())?;
    write_values(w, layer.bias())
}

/// Read one layer's weights and biases from the next two lines of `r`.
///
/// `path` names the stream in I/O errors. `line` is the number of lines consumed so far; it is
/// advanced and used in parse errors. The layer is only modified once both lines parsed with
/// the expected counts.
pub fn read_layer<R: BufRead>(
    r: &mut R,
    layer: &mut Layer,
    path: &Path,
    line: &mut usize,
) -> Result<()> {
    let weights = read_values(r, path, line, layer.weights().len(), "weights")?;
    let bias = read_values(r, path, line, layer.bias().len(), "bias")?;
    layer.weights_mut().copy_from_slice(&weights);
    layer.bias_mut().copy_from_slice(&bias);
    Ok(())
}

/// Write every layer of `network` to `path`, replacing any existing file.
pub fn save_checkpoint<P: AsRef<Path>>(network: &Network, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut w = BufWriter::new(file);
    for layer in network.layers() {
        write_layer(&mut w, layer).map_err(|e| Error::io(path, e))?;
    }
    w.flush().map_err(|e| Error::io(path, e))?;
    log::info!(
        "saved checkpoint for {} layers to {}",
        network.num_layers(),
        path.display()
    );
    Ok(())
}

/// Load parameters from `path` into `network`.
///
/// The whole file is parsed into a scratch copy first; on any error `network` is unchanged.
pub fn load_checkpoint<P: AsRef<Path>>(network: &mut Network, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut r = BufReader::new(file);

    let mut staged = network.clone();
    let mut line = 0;
    for idx in 0..staged.num_layers() {
        if let Some(layer) = staged.layer_mut(idx) {
            read_layer(&mut r, layer, path, &mut line)?;
        }
    }

    let mut rest = String::new();
    loop {
        rest.clear();
        let n = r.read_line(&mut rest).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        line += 1;
        if !rest.trim().is_empty() {
            return Err(Error::Parse {
                line,
                message: format!(
                    "unexpected data after {} layers",
                    network.num_layers()
                ),
            });
        }
    }

    for idx in 0..network.num_layers() {
        if let (Some(dst), Some(src)) = (network.layer_mut(idx), staged.layer(idx)) {
            dst.weights_mut().copy_from_slice(src.weights());
            dst.bias_mut().copy_from_slice(src.bias());
        }
    }
    log::info!(
        "loaded checkpoint for {} layers from {}",
        network.num_layers(),
        path.display()
    );
    Ok(())
}

fn write_values<W: Write>(w: &mut W, values: &[f32]) -> std::io::Result<()> {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            w.write_all(b" ")?;
        }
        write!(w, "{v:e}")?;
    }
    writeln!(w)
}

fn read_values<R: BufRead>(
    r: &mut R,
    path: &Path,
    line: &mut usize,
    expected: usize,
    what: &str,
) -> Result<Vec<f32>> {
    let mut buf = String::new();
    let n = r.read_line(&mut buf).map_err(|e| Error::io(path, e))?;
    *line += 1;
    if n == 0 {
        return Err(Error::Parse {
            line: *line,
            message: format!("unexpected end of file, expected {expected} {what} values"),
        });
    }

    let values = decode_line(&buf, *line)?;
    if values.len() != expected {
        return Err(Error::Parse {
            line: *line,
            message: format!("expected {expected} {what} values, found {}", values.len()),
        });
    }
    Ok(values)
}

fn decode_line(text: &str, line: usize) -> Result<Vec<f32>> {
    text.split_whitespace()
        .map(|tok| {
            tok.parse::<f32>().map_err(|e| Error::Parse {
                line,
                message: format!("{tok:?} is not a float: {e}"),
            })
        })
        .collect()
}
