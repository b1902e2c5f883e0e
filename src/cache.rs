use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tracing::info;

use crate::database::Database;
use crate::models::{Room, Seat};

// Карта мест аудитории живёт в кеше до явной инвалидации или часа TTL
const ROOM_MAP_TTL_SECS: u64 = 3600;

#[derive(Clone)]
pub struct CacheService {
    conn: MultiplexedConnection,
    db: Database,
}

impl CacheService {
    pub async fn connect(redis_url: &str, db: Database) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { conn, db })
    }

    // Прогрев кеша при старте
    pub async fn warmup(&self) {
        info!("Starting cache warmup...");

        for room in Room::ALL {
            if let Ok(seats) = self.load_room_from_db(room).await {
                info!("Loaded {} seats for room {}", seats.len(), room);
                let _ = self.save_room_to_cache(room, &seats).await;
            }
        }

        info!("Cache warmup done");
    }

    /// Карта мест аудитории. Второе значение: пришёл ли ответ из кеша.
    pub async fn room_map(&self, room: Room) -> (Vec<Seat>, bool) {
        // Сначала пробуем кеш
        if let Ok(seats) = self.get_room_from_cache(room).await {
            return (seats, true);
        }

        // Если кеш не работает - идем в БД
        if let Ok(seats) = self.load_room_from_db(room).await {
            let _ = self.save_room_to_cache(room, &seats).await;
            return (seats, false);
        }

        (vec![], false)
    }

    // Инвалидировать карту мест после любой мутации движка
    pub async fn invalidate_room(&self, room: Room) {
        let mut conn = self.conn.clone();
        let _: Result<(), _> = conn.del(Self::room_key(room)).await;
        info!("Invalidated seat map cache for room {}", room);
    }

    fn room_key(room: Room) -> String {
        format!("seats:room:{}", room)
    }

    // === Работа с БД ===

    async fn load_room_from_db(&self, room: Room) -> Result<Vec<Seat>, sqlx::Error> {
        sqlx::query_as::<_, Seat>(
            "SELECT number, section, room_number, status, assigned_to, confirmed, created_at, updated_at
             FROM seats
             WHERE room_number = $1
             ORDER BY section, number",
        )
        .bind(room)
        .fetch_all(&self.db.pool)
        .await
    }

    // === Работа с кешем ===

    async fn get_room_from_cache(&self, room: Room) -> Result<Vec<Seat>, redis::RedisError> {
        let mut conn = self.conn.clone();
        let data: String = conn.get(Self::room_key(room)).await?;
        let seats: Vec<Seat> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(seats)
    }

    async fn save_room_to_cache(&self, room: Room, seats: &[Seat]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.conn.clone();
        conn.set_ex(Self::room_key(room), data, ROOM_MAP_TTL_SECS).await
    }
}
