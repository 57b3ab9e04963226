use chrono::Utc;
use futures::stream::{BoxStream, StreamExt};
use sqlx::{sqlite::SqliteRow, Row};

use clientele_core::domain::customer::{Customer, CustomerId, CustomerProfile, CustomerType};

use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                name,
                customer_type,
                profile,
                document_id,
                email,
                phone_number,
                address
             FROM customer
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(customer_from_row).transpose()
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO customer (
                id,
                name,
                customer_type,
                profile,
                document_id,
                email,
                phone_number,
                address,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                customer_type = excluded.customer_type,
                profile = excluded.profile,
                document_id = excluded.document_id,
                email = excluded.email,
                phone_number = excluded.phone_number,
                address = excluded.address,
                updated_at = excluded.updated_at",
        )
        .bind(&customer.id.0)
        .bind(&customer.name)
        .bind(customer.customer_type.as_str())
        .bind(customer.profile.as_str())
        .bind(&customer.document_id)
        .bind(&customer.email)
        .bind(&customer.phone_number)
        .bind(&customer.address)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &CustomerId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM customer WHERE id = ?").bind(&id.0).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    fn list_all(&self) -> BoxStream<'_, Result<Customer, RepositoryError>> {
        sqlx::query(
            "SELECT
                id,
                name,
                customer_type,
                profile,
                document_id,
                email,
                phone_number,
                address
             FROM customer",
        )
        .fetch(&self.pool)
        .map(|row| row.map_err(RepositoryError::from).and_then(customer_from_row))
        .boxed()
    }
}

fn customer_from_row(row: SqliteRow) -> Result<Customer, RepositoryError> {
    let customer_type = row
        .try_get::<String, _>("customer_type")?
        .parse::<CustomerType>()
        .map_err(|err| RepositoryError::Decode(err.to_string()))?;
    let profile = row
        .try_get::<String, _>("profile")?
        .parse::<CustomerProfile>()
        .map_err(|err| RepositoryError::Decode(err.to_string()))?;

    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        name: row.try_get("name")?,
        customer_type,
        profile,
        document_id: row.try_get("document_id")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        address: row.try_get("address")?,
    })
}
