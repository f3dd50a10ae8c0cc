//! Orientation samples read from a text feed.
//!
//! Each line carries three whitespace-separated rotation values in radians
//! (`x y z`). Lines starting with `#` and blank lines are skipped; malformed
//! lines are logged and dropped. The feed runs on its own thread and writes
//! straight into the shared controls through a [`SkewMapper`].
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};

use crate::input::SkewMapper;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrientationFeed {
    Stdin,
    File(PathBuf),
}

impl OrientationFeed {
    /// `-` selects standard input; anything else is a path.
    pub fn parse(value: &str) -> Self {
        if value.trim() == "-" {
            OrientationFeed::Stdin
        } else {
            OrientationFeed::File(PathBuf::from(value))
        }
    }
}

pub fn parse_sample(line: &str) -> Option<[f32; 3]> {
    let mut values = line.split_whitespace().map(str::parse::<f32>);
    let sample = [values.next()?.ok()?, values.next()?.ok()?, values.next()?.ok()?];
    if values.next().is_some() || sample.iter().any(|value| !value.is_finite()) {
        return None;
    }
    Some(sample)
}

/// Reads samples until end of input. Returns the number of samples applied.
pub fn pump_samples<R: BufRead>(reader: R, mapper: &SkewMapper) -> io::Result<usize> {
    let mut applied = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_sample(trimmed) {
            Some(rotation) => {
                if mapper.orientation(rotation) {
                    applied += 1;
                }
            }
            None => tracing::warn!(
                line = index + 1,
                text = trimmed,
                "ignoring malformed orientation sample"
            ),
        }
    }
    Ok(applied)
}

pub fn spawn_orientation_feed(feed: OrientationFeed, mapper: SkewMapper) -> Result<JoinHandle<()>> {
    let reader: Box<dyn BufRead + Send> = match &feed {
        OrientationFeed::Stdin => Box::new(BufReader::new(io::stdin())),
        OrientationFeed::File(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open orientation feed {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
    };

    thread::Builder::new()
        .name("depthview-orientation".into())
        .spawn(move || match pump_samples(reader, &mapper) {
            Ok(applied) => tracing::debug!(?feed, applied, "orientation feed ended"),
            Err(err) => tracing::warn!(?feed, error = %err, "orientation feed failed"),
        })
        .context("failed to spawn orientation feed thread")
}
