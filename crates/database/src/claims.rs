use {
    chrono::{DateTime, Utc},
    sqlx::PgConnection,
};

/// A wallet that has been paid. `address` is stored in its lowercase hex
/// form, the table enforces uniqueness on it.
#[derive(Clone, Debug, Default, sqlx::FromRow, Eq, PartialEq)]
pub struct Claim {
    pub address: String,
    pub claimed_at: DateTime<Utc>,
    pub tx_hash: String,
}

/// Inserts a claim. Fails with a unique violation (see
/// [`crate::is_unique_violation`]) if the address already has a claim.
pub async fn insert(ex: &mut PgConnection, claim: &Claim) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
        INSERT INTO claims (address, claimed_at, tx_hash)
        VALUES ($1, $2, $3)
    "#;
    sqlx::query(QUERY)
        .bind(&claim.address)
        .bind(claim.claimed_at)
        .bind(&claim.tx_hash)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn exists(ex: &mut PgConnection, address: &str) -> Result<bool, sqlx::Error> {
    const QUERY: &str = r#"
        SELECT EXISTS (SELECT 1 FROM claims WHERE address = $1)
    "#;
    sqlx::query_scalar(QUERY).bind(address).fetch_one(ex).await
}
