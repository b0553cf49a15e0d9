//! Length caps, lockout thresholds and paging limits shared by the entities
//! and repositories.

// User
pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 32;
pub const DISPLAY_NAME_MAX_LENGTH: usize = 64;
pub const BIO_MAX_LENGTH: usize = 500;
pub const LOCATION_MAX_LENGTH: usize = 100;
pub const WEBSITE_MAX_LENGTH: usize = 255;
pub const SOCIAL_ACCOUNT_MAX_LENGTH: usize = 50;
pub const EMAIL_MAX_LENGTH: usize = 254;

// Lockout: (failure threshold, lock minutes), strongest first
pub const LOCK_THRESHOLDS: [(i64, i64); 3] = [(10, 1440), (5, 60), (3, 15)];

// Post and page
pub const TITLE_MAX_LENGTH: usize = 255;
pub const SLUG_MAX_LENGTH: usize = 255;
pub const EXCERPT_MAX_LENGTH: usize = 500;
pub const CONTENT_MAX_LENGTH: usize = 1_000_000;
pub const META_TITLE_MAX_LENGTH: usize = 70;
pub const META_DESCRIPTION_MAX_LENGTH: usize = 160;
pub const CANONICAL_URL_MAX_LENGTH: usize = 255;
pub const TAG_MAX_COUNT: usize = 20;
pub const TAG_NAME_MAX_LENGTH: usize = 50;
pub const TEMPLATE_MAX_LENGTH: usize = 100;
pub const DEFAULT_TEMPLATE: &str = "default";
pub const DEFAULT_EXCERPT_LENGTH: usize = 200;

// Reading time
pub const READING_SPEED_WORDS_PER_MINUTE: i64 = 200;
pub const READING_TIME_MIN: i64 = 1;
pub const READING_TIME_MAX: i64 = 999;

// Login log
pub const LOGIN_USERNAME_MAX_LENGTH: usize = 64;
pub const IP_ADDRESS_MAX_LENGTH: usize = 45;
pub const USER_AGENT_MAX_LENGTH: usize = 512;
pub const GEO_FIELD_MAX_LENGTH: usize = 100;

// Paging
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_POPULAR_LIMIT: i64 = 10;
pub const DEFAULT_POPULAR_DAYS: i64 = 30;
pub const DEFAULT_RECENT_LIMIT: i64 = 5;
pub const DEFAULT_FAILED_LOGIN_LIMIT: i64 = 100;
pub const MAX_FAILED_LOGIN_LIMIT: i64 = 1000;

/// Lock duration in minutes for a failure count, or `None` below the first threshold.
pub fn lock_minutes_for(fail_count: i64) -> Option<i64> {
    LOCK_THRESHOLDS
        .iter()
        .find(|(threshold, _)| fail_count >= *threshold)
        .map(|(_, minutes)| *minutes)
}

/// `clamp(ceil(words / 200), 1, 999)`; non-positive counts read in one minute.
pub fn calculate_reading_time(word_count: i64) -> i64 {
    if word_count <= 0 {
        return READING_TIME_MIN;
    }
    let minutes = word_count / READING_SPEED_WORDS_PER_MINUTE
        + i64::from(word_count % READING_SPEED_WORDS_PER_MINUTE != 0);
    minutes.clamp(READING_TIME_MIN, READING_TIME_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_minutes_thresholds() {
        assert_eq!(lock_minutes_for(0), None);
        assert_eq!(lock_minutes_for(2), None);
        assert_eq!(lock_minutes_for(3), Some(15));
        assert_eq!(lock_minutes_for(4), Some(15));
        assert_eq!(lock_minutes_for(5), Some(60));
        assert_eq!(lock_minutes_for(9), Some(60));
        assert_eq!(lock_minutes_for(10), Some(1440));
        assert_eq!(lock_minutes_for(250), Some(1440));
    }

    #[test]
    fn test_reading_time_bounds() {
        assert_eq!(calculate_reading_time(-5), 1);
        assert_eq!(calculate_reading_time(0), 1);
        assert_eq!(calculate_reading_time(1), 1);
        assert_eq!(calculate_reading_time(200), 1);
        assert_eq!(calculate_reading_time(201), 2);
        assert_eq!(calculate_reading_time(1_000), 5);
        assert_eq!(calculate_reading_time(10_000_000), 999);
        assert_eq!(calculate_reading_time(i64::MAX), 999);
    }
}
