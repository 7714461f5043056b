use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{DateRange, RawEventCounts};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Sample daily counts for the two weeks before `today`.
pub async fn seed(pool: &PgPool, project_id: &str, today: NaiveDate) -> anyhow::Result<usize> {
    let daily = [
        ("$ae_session", 1800),
        ("Page View", 1650),
        ("Receipt Uploaded", 140),
        ("PlanetPoints Added", 120),
        ("Sign Up", 12),
        ("User Onboarded", 9),
        ("Voucher Redeemed", 6),
        ("Referral Completed", 2),
    ];

    let mut inserted = 0usize;
    for days_ago in 1..=14i64 {
        let occurred_on = today - Duration::days(days_ago);
        // the older week runs a little quieter so comparisons have something to show
        let scale = if days_ago > 7 { 0.7 } else { 1.0 };

        for (event_name, base) in daily {
            let count = (f64::from(base) * scale).round() as i64 + (days_ago % 3);
            let source_key = format!("seed-{project_id}-{event_name}-{occurred_on}");
            inserted += insert_count(pool, project_id, event_name, occurred_on, count, &source_key)
                .await? as usize;
        }
    }

    Ok(inserted)
}

async fn insert_count(
    pool: &PgPool,
    project_id: &str,
    event_name: &str,
    occurred_on: NaiveDate,
    count: i64,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO usage_digest.event_counts
        (id, project_id, event_name, occurred_on, count, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(event_name)
    .bind(occurred_on)
    .bind(count)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Summed counts per event over `range`, both ends included. An empty
/// `events` slice returns every event recorded for the project.
pub async fn fetch_event_counts(
    pool: &PgPool,
    project_id: &str,
    events: &[String],
    range: DateRange,
) -> anyhow::Result<RawEventCounts> {
    let mut query = String::from(
        "SELECT event_name, SUM(count)::BIGINT AS total \
         FROM usage_digest.event_counts \
         WHERE project_id = $1 AND occurred_on BETWEEN $2 AND $3",
    );

    if !events.is_empty() {
        query.push_str(" AND event_name = ANY($4)");
    }
    query.push_str(" GROUP BY event_name");

    let mut rows = sqlx::query(&query)
        .bind(project_id)
        .bind(range.start)
        .bind(range.end);

    if !events.is_empty() {
        rows = rows.bind(events);
    }

    let records = rows
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to fetch event counts for {range}"))?;

    let mut counts = RawEventCounts::new();
    for row in records {
        counts.insert(row.get::<String, _>("event_name"), row.get::<i64, _>("total"));
    }

    debug!(project_id, range = %range, events = counts.len(), "fetched event counts");
    Ok(counts)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    project_id: String,
    event_name: String,
    occurred_on: NaiveDate,
    count: i64,
    source_key: Option<String>,
}

impl CsvRow {
    fn check(&self, line: usize) -> anyhow::Result<()> {
        if self.event_name.trim().is_empty() {
            anyhow::bail!("row {line}: event_name is empty");
        }
        if self.count < 0 {
            anyhow::bail!(
                "row {line}: negative count {} for event '{}'",
                self.count,
                self.event_name
            );
        }
        Ok(())
    }

    fn source_key(&self) -> String {
        self.source_key.clone().unwrap_or_else(|| {
            format!(
                "import-{}-{}-{}",
                self.project_id, self.event_name, self.occurred_on
            )
        })
    }
}

fn read_csv_rows<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<CsvRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = result.with_context(|| format!("row {line}: malformed record"))?;
        row.check(line)?;
        rows.push(row);
    }

    Ok(rows)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_csv_rows(file)?;
    let mut inserted = 0usize;

    for row in &rows {
        let source_key = row.source_key();
        if insert_count(
            pool,
            &row.project_id,
            &row.event_name,
            row.occurred_on,
            row.count,
            &source_key,
        )
        .await?
        {
            inserted += 1;
        }
    }

    info!(rows = rows.len(), inserted, "imported event counts");
    Ok(inserted)
}
