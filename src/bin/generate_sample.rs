use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Column-oriented buffer for the generated observations.
#[derive(Default)]
struct Columns {
    region: Vec<&'static str>,
    parameter: Vec<&'static str>,
    stimulus_type: Vec<&'static str>,
    subject_id: Vec<String>,
    correlation_by_condition: Vec<f64>,
    correlation_overall: Vec<f64>,
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let regions = ["SC", "LGN", "V1"];
    let parameters = ["flynet", "pixel", "motion_energy"];
    let stimuli = ["ring_expand", "ring_contract", "looming", "grating"];
    let n_subjects = 8;
    let repeats = 3;

    // Expanding rings drive the flynet model in SC harder than other
    // stimuli, so the target group sits above zero on the plots.
    let boost = |region: &str, parameter: &str, stimulus: &str| -> f64 {
        match (region, parameter, stimulus) {
            ("SC", "flynet", "ring_expand") => 0.15,
            ("SC", "flynet", "looming") => 0.05,
            (_, "flynet", "ring_expand") => 0.04,
            _ => 0.0,
        }
    };

    let mut cols = Columns::default();
    for subject in 1..=n_subjects {
        let subject_id = format!("S{subject}");
        let subject_offset = rng.gauss(0.0, 0.03);

        for &region in &regions {
            for &parameter in &parameters {
                let overall = (0.3 + rng.gauss(0.0, 0.05)).clamp(-1.0, 1.0);

                for &stimulus in &stimuli {
                    for _ in 0..repeats {
                        let by_condition = (overall
                            + boost(region, parameter, stimulus)
                            + subject_offset
                            + rng.gauss(0.0, 0.04))
                        .clamp(-1.0, 1.0);

                        cols.region.push(region);
                        cols.parameter.push(parameter);
                        cols.stimulus_type.push(stimulus);
                        cols.subject_id.push(subject_id.clone());
                        cols.correlation_by_condition.push(by_condition);
                        cols.correlation_overall.push(overall);
                    }
                }
            }
        }
    }

    let n_rows = cols.region.len();

    let schema = Arc::new(Schema::new(vec![
        Field::new("region", DataType::Utf8, false),
        Field::new("parameter", DataType::Utf8, false),
        Field::new("stimulus_type", DataType::Utf8, false),
        Field::new("subject_id", DataType::Utf8, false),
        Field::new("correlation_by_condition", DataType::Float64, false),
        Field::new("correlation_overall", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(cols.region)),
            Arc::new(StringArray::from(cols.parameter)),
            Arc::new(StringArray::from(cols.stimulus_type)),
            Arc::new(StringArray::from(cols.subject_id)),
            Arc::new(Float64Array::from(cols.correlation_by_condition)),
            Arc::new(Float64Array::from(cols.correlation_overall)),
        ],
    )
    .context("creating record batch")?;

    // Write Parquet
    let output_path = "sample_observations.parquet";
    let file = std::fs::File::create(output_path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    println!(
        "Wrote {n_rows} observations ({n_subjects} subjects, {} regions, {} parameters) \
         to {output_path}",
        regions.len(),
        parameters.len()
    );
    Ok(())
}
