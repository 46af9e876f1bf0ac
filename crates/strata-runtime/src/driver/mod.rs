mod postgres;

pub use postgres::PgDriver;
