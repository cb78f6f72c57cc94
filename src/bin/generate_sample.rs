use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
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

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Integer in `1..=n`.
    fn code(&mut self, n: u64) -> u64 {
        1 + self.next_u64() % n
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Per-project records with coded categories. Includes a repeated row,
/// blank cells and an energy-type code outside the label map.
fn write_projects(path: &Path, rng: &mut SimpleRng) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path).context("creating projects CSV")?;
    writer.write_record([
        "Type_of_Renewable_Energy",
        "Installed_Capacity_MW",
        "Energy_Production_MWh",
        "Energy_Consumption_MWh",
        "Initial_Investment_USD",
        "Funding_Sources",
        "Grid_Integration_Level",
        "GHG_Emission_Reduction_tCO2e",
        "Air_Pollution_Reduction_Index",
    ])?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for i in 0..120 {
        let kind = if i == 57 { 9 } else { rng.code(7) };
        let capacity = rng.range(5.0, 500.0);
        let production = capacity * rng.range(900.0, 2600.0) + 40.0 * i as f64;
        let consumption = production * rng.range(0.6, 1.1);
        let investment = capacity * rng.range(0.8e6, 2.5e6);
        let ghg = production * rng.range(0.3, 0.7);
        let air = rng.range(1.0, 100.0);

        let mut row = vec![
            kind.to_string(),
            format!("{:.2}", capacity),
            format!("{:.2}", round2(production)),
            format!("{:.2}", round2(consumption)),
            format!("{:.0}", investment),
            rng.code(3).to_string(),
            rng.code(4).to_string(),
            format!("{:.2}", ghg),
            format!("{:.2}", air),
        ];
        if i % 23 == 11 {
            row[3].clear();
        }
        if i % 31 == 7 {
            row[5].clear();
        }
        rows.push(row);
    }
    rows.push(rows[10].clone());

    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

struct MixRow {
    country: &'static str,
    year: i64,
    parts: [f64; 4],
    total: f64,
}

/// Yearly energy mix per country. A few stored totals disagree with their
/// components so reconciliation has work to do.
fn country_mix(rng: &mut SimpleRng) -> Vec<MixRow> {
    let countries = [
        ("Brazil", [4.0, 20.0, 380.0, 55.0]),
        ("Germany", [45.0, 110.0, 20.0, 50.0]),
        ("India", [60.0, 65.0, 150.0, 30.0]),
        ("Kenya", [0.5, 1.5, 3.5, 5.0]),
        ("Spain", [30.0, 55.0, 25.0, 8.0]),
    ];

    let mut out = Vec::new();
    for (c, (country, base)) in countries.iter().enumerate() {
        for (k, year) in (2010..=2022).enumerate() {
            let growth = 1.0 + 0.08 * k as f64;
            let mut parts = [0.0; 4];
            for (p, b) in parts.iter_mut().zip(base) {
                *p = round2((b * growth + rng.gauss(0.0, b * 0.03)).max(0.0));
            }
            let mut total: f64 = parts.iter().sum();
            if (c + k) % 17 == 3 {
                total = round2(total * 1.1);
            }
            out.push(MixRow {
                country: *country,
                year,
                parts,
                total,
            });
        }
    }
    out
}

fn write_mix_csv(path: &Path, rows: &[MixRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating country mix CSV")?;
    writer.write_record([
        "Country",
        "Year",
        "Solar_Energy",
        "Wind_Energy",
        "Hydro_Energy",
        "Other_Renewable_Energy",
        "Total_Renewable_Energy",
    ])?;
    for r in rows {
        let mut record = vec![r.country.to_string(), r.year.to_string()];
        record.extend(r.parts.iter().map(|p| p.to_string()));
        record.push(r.total.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_mix_parquet(path: &Path, rows: &[MixRow]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Country", DataType::Utf8, false),
        Field::new("Year", DataType::Int64, false),
        Field::new("Solar_Energy", DataType::Float64, true),
        Field::new("Wind_Energy", DataType::Float64, true),
        Field::new("Hydro_Energy", DataType::Float64, true),
        Field::new("Other_Renewable_Energy", DataType::Float64, true),
        Field::new("Total_Renewable_Energy", DataType::Float64, true),
    ]));

    let part = |i: usize| -> ArrayRef {
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.parts[i])))
    };
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.country))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.year))),
        part(0),
        part(1),
        part(2),
        part(3),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.total))),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);

    let projects = out_dir.join("energy_projects.csv");
    let n = write_projects(&projects, &mut rng)?;
    println!("Wrote {n} project rows to {}", projects.display());

    let mix = country_mix(&mut rng);
    let mix_csv = out_dir.join("country_mix.csv");
    write_mix_csv(&mix_csv, &mix)?;
    let mix_parquet = out_dir.join("country_mix.parquet");
    write_mix_parquet(&mix_parquet, &mix)?;
    println!(
        "Wrote {} country-year rows to {} and {}",
        mix.len(),
        mix_csv.display(),
        mix_parquet.display()
    );
    Ok(())
}
