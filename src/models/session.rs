use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, FromRow)]
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    pub csrf_token: String,
    pub expires_at: OffsetDateTime,
    pub is_persistent: bool,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn session_expiring_at(expires_at: OffsetDateTime) -> Session {
        Session {
            session_id: "s".into(),
            user_id: 1,
            csrf_token: "c".into(),
            expires_at,
            is_persistent: false,
        }
    }

    #[test]
    fn expiry_is_compared_against_now() {
        assert!(session_expiring_at(OffsetDateTime::now_utc() - Duration::minutes(1)).is_expired());
        assert!(!session_expiring_at(OffsetDateTime::now_utc() + Duration::minutes(30)).is_expired());
    }
}
