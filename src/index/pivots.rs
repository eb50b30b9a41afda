//! Pivot selection: random sample, pivot file, or synthesized pivots.

use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::IndexParams;
use crate::error::{NappError, Result};
use crate::space::Space;
use crate::types::IdType;

/// Where the pivot objects came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotSource {
    /// Sampled from the dataset; positions are recorded.
    Sampled,
    /// Read from a pivot file.
    File,
    /// Synthesized from groups of sampled dataset objects.
    Generated,
}

/// The fixed reference objects of a built index.
#[derive(Debug, Clone)]
pub struct PivotSet<O> {
    pub objects: Vec<O>,
    /// Dataset positions of sampled pivots; empty for file/generated pivots.
    pub positions: Vec<IdType>,
    pub source: PivotSource,
}

impl<O> PivotSet<O> {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Choose the pivot set described by `params`.
pub fn select_pivots<S: Space>(
    space: &S,
    data: &[S::Object],
    params: &IndexParams,
) -> Result<PivotSet<S::Object>> {
    if let Some(path) = &params.pivot_file {
        let objects = load_pivot_file(space, Path::new(path), params.num_pivot)?;
        info!(path = %path, count = objects.len(), "loaded pivots from file");
        return Ok(PivotSet {
            objects,
            positions: Vec::new(),
            source: PivotSource::File,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.pivot_seed);

    if params.gen_pivot_qty > 0 {
        let objects = generate_pivots(space, data, params, &mut rng)?;
        info!(
            count = objects.len(),
            sources_per_pivot = params.gen_pivot_qty,
            "generated synthetic pivots"
        );
        return Ok(PivotSet {
            objects,
            positions: Vec::new(),
            source: PivotSource::Generated,
        });
    }

    if data.len() < params.num_pivot {
        return Err(NappError::invalid(
            "num_pivot",
            format!(
                "cannot sample {} pivots from {} objects",
                params.num_pivot,
                data.len()
            ),
        ));
    }
    let positions: Vec<IdType> = rand::seq::index::sample(&mut rng, data.len(), params.num_pivot)
        .into_iter()
        .map(|i| i as IdType)
        .collect();
    let objects = positions.iter().map(|&i| data[i as usize].clone()).collect();
    debug!(count = params.num_pivot, seed = params.pivot_seed, "sampled pivots");

    Ok(PivotSet {
        objects,
        positions,
        source: PivotSource::Sampled,
    })
}

/// Read `num_pivot` objects from a text file, one per non-empty line.
/// Lines starting with `#` are comments.
pub fn load_pivot_file<S: Space>(space: &S, path: &Path, num_pivot: usize) -> Result<Vec<S::Object>> {
    let file = std::fs::File::open(path).map_err(|e| {
        NappError::Config(format!("cannot open pivot file {}: {e}", path.display()))
    })?;

    let mut objects = Vec::with_capacity(num_pivot);
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        if objects.len() == num_pivot {
            break;
        }
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let obj = space.parse_object(trimmed).map_err(|e| {
            NappError::Parse(format!("{}:{}: {e}", path.display(), lineno + 1))
        })?;
        objects.push(obj);
    }

    if objects.len() < num_pivot {
        return Err(NappError::invalid(
            "pivot_file",
            format!(
                "{} holds {} pivots, {} requested",
                path.display(),
                objects.len(),
                num_pivot
            ),
        ));
    }
    Ok(objects)
}

fn generate_pivots<S: Space>(
    space: &S,
    data: &[S::Object],
    params: &IndexParams,
    rng: &mut StdRng,
) -> Result<Vec<S::Object>> {
    if data.len() < params.gen_pivot_qty {
        return Err(NappError::invalid(
            "gen_pivot_qty",
            format!(
                "cannot draw {} sources from {} objects",
                params.gen_pivot_qty,
                data.len()
            ),
        ));
    }

    (0..params.num_pivot)
        .map(|_| {
            let sources: Vec<&S::Object> =
                rand::seq::index::sample(&mut *rng, data.len(), params.gen_pivot_qty)
                    .into_iter()
                    .map(|i| &data[i])
                    .collect();
            space.synthesize_pivot(&sources).ok_or_else(|| {
                NappError::invalid(
                    "gen_pivot_qty",
                    format!("space '{}' cannot synthesize pivots", space.name()),
                )
            })
        })
        .collect()
}
