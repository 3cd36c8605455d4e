pub use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
  time::Duration,
};

pub use chrono::{NaiveDateTime as DateTime, TimeDelta, Utc};
pub use dashmap::DashMap;
pub use migration::{Migrator, MigratorTrait};
pub use sea_orm::{
  ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection,
  EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
pub use tracing::{debug, error, info, warn};

pub use crate::error::{Error, Resource, Result};
