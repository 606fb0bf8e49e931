#[cfg(test)]
mod tests {
    use crate::config::settings::{HourlyWindow, RateLimitingSettings};
    use crate::domain::services::rate_limiting_service::DomainRateLimiter;
    use crate::utils::errors::LeadError;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn fixed_spacing(secs: u64) -> RateLimitingSettings {
        RateLimitingSettings {
            min_delay_ms: secs * 1000,
            max_delay_ms: secs * 1000,
            ..Default::default()
        }
    }

    fn timeout() -> LeadError {
        LeadError::FetchTimeout("https://foo.com/careers".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate_then_spaced() {
        let limiter = DomainRateLimiter::new(fixed_spacing(2));

        let start = Instant::now();
        let permit = limiter.acquire("acme.io", None).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        permit.success(Duration::from_millis(100));

        let permit = limiter.acquire("acme.io", None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(permit.waited() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jittered_spacing_stays_within_floor_and_ceiling() {
        let limiter = DomainRateLimiter::new(RateLimitingSettings::default());

        let mut last = Instant::now();
        limiter.acquire("acme.io", None).await.unwrap().success(Duration::ZERO);
        for _ in 0..5 {
            limiter
                .acquire("acme.io", None)
                .await
                .unwrap()
                .success(Duration::ZERO);
            let gap = last.elapsed();
            assert!(gap >= Duration::from_secs(2), "gap {:?} below floor", gap);
            assert!(gap <= Duration::from_secs(5) + Duration::from_millis(1));
            last = Instant::now();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_delay_overrides_floor() {
        let limiter = DomainRateLimiter::new(fixed_spacing(2));

        limiter
            .acquire("acme.io", Some(Duration::from_secs(10)))
            .await
            .unwrap()
            .success(Duration::ZERO);
        let start = Instant::now();
        limiter
            .acquire("acme.io", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_after_three_timeouts_waits_eight_times_floor() {
        let limiter = DomainRateLimiter::new(fixed_spacing(2));

        for _ in 0..3 {
            limiter.acquire("foo.com", None).await.unwrap().failure(&timeout());
        }
        let stats = limiter.stats("foo.com").await.unwrap();
        assert_eq!(stats.consecutive_errors, 3);
        assert_eq!(stats.backoff_multiplier, 8);

        let start = Instant::now();
        limiter.acquire("foo.com", None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_backoff() {
        let limiter = DomainRateLimiter::new(fixed_spacing(1));

        limiter.acquire("foo.com", None).await.unwrap().failure(&timeout());
        limiter.acquire("foo.com", None).await.unwrap().failure(&timeout());
        assert_eq!(limiter.stats("foo.com").await.unwrap().backoff_multiplier, 4);

        limiter
            .acquire("foo.com", None)
            .await
            .unwrap()
            .success(Duration::from_millis(50));
        let stats = limiter.stats("foo.com").await.unwrap();
        assert_eq!(stats.backoff_multiplier, 1);
        assert_eq!(stats.consecutive_errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_multiplier_and_delay_are_capped() {
        let settings = RateLimitingSettings {
            max_backoff_multiplier: 4,
            max_backoff_secs: 5,
            ..fixed_spacing(2)
        };
        let limiter = DomainRateLimiter::new(settings);

        for _ in 0..6 {
            limiter.acquire("foo.com", None).await.unwrap().failure(&timeout());
        }
        assert_eq!(limiter.stats("foo.com").await.unwrap().backoff_multiplier, 4);

        let start = Instant::now();
        limiter.acquire("foo.com", None).await.unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_do_not_back_off() {
        let limiter = DomainRateLimiter::new(fixed_spacing(1));
        let not_found = LeadError::FetchClientError {
            url: "https://acme.io/x".to_string(),
            status: 404,
        };

        limiter.acquire("acme.io", None).await.unwrap().failure(&not_found);
        let stats = limiter.stats("acme.io").await.unwrap();
        assert_eq!(stats.backoff_multiplier, 1);
        assert_eq!(stats.consecutive_errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_requests_backs_off() {
        let limiter = DomainRateLimiter::new(fixed_spacing(1));
        let throttled = LeadError::FetchServerError {
            url: "https://acme.io/x".to_string(),
            status: 429,
        };

        limiter.acquire("acme.io", None).await.unwrap().failure(&throttled);
        assert_eq!(limiter.stats("acme.io").await.unwrap().backoff_multiplier, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_responses_widen_spacing() {
        let limiter = DomainRateLimiter::new(fixed_spacing(2));

        limiter
            .acquire("slow.io", None)
            .await
            .unwrap()
            .success(Duration::from_secs(4));
        let stats = limiter.stats("slow.io").await.unwrap();
        assert!((stats.latency_multiplier - 2.0).abs() < 1e-9);

        let start = Instant::now();
        limiter.acquire("slow.io", None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_multiplier_is_capped() {
        let limiter = DomainRateLimiter::new(fixed_spacing(1));
        limiter
            .acquire("slow.io", None)
            .await
            .unwrap()
            .success(Duration::from_secs(60));
        let stats = limiter.stats("slow.io").await.unwrap();
        assert!((stats.latency_multiplier - 3.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_cap_fail_fast() {
        let settings = RateLimitingSettings {
            requests_per_domain_per_hour: 2,
            fail_fast: true,
            ..fixed_spacing(1)
        };
        let limiter = DomainRateLimiter::new(settings);

        limiter.acquire("acme.io", None).await.unwrap().success(Duration::ZERO);
        limiter.acquire("acme.io", None).await.unwrap().success(Duration::ZERO);

        let result = limiter.acquire("acme.io", None).await;
        assert!(matches!(result, Err(LeadError::RateLimitExceeded(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_cap_waits_for_rolling_window() {
        let settings = RateLimitingSettings {
            requests_per_domain_per_hour: 2,
            max_wait_secs: 3600,
            ..fixed_spacing(1)
        };
        let limiter = DomainRateLimiter::new(settings);

        let start = Instant::now();
        limiter.acquire("acme.io", None).await.unwrap().success(Duration::ZERO);
        limiter.acquire("acme.io", None).await.unwrap().success(Duration::ZERO);
        limiter.acquire("acme.io", None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_cap_beyond_horizon_fails() {
        let settings = RateLimitingSettings {
            requests_per_domain_per_hour: 1,
            max_wait_secs: 60,
            ..fixed_spacing(1)
        };
        let limiter = DomainRateLimiter::new(settings);

        limiter.acquire("acme.io", None).await.unwrap().success(Duration::ZERO);
        assert!(matches!(
            limiter.acquire("acme.io", None).await,
            Err(LeadError::RateLimitExceeded(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_window_resets_after_an_hour() {
        let settings = RateLimitingSettings {
            requests_per_domain_per_hour: 1,
            hourly_window: HourlyWindow::Fixed,
            fail_fast: true,
            ..fixed_spacing(1)
        };
        let limiter = DomainRateLimiter::new(settings);

        limiter.acquire("acme.io", None).await.unwrap().success(Duration::ZERO);
        assert!(limiter.acquire("acme.io", None).await.is_err());

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(limiter.acquire("acme.io", None).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_domain_requests_are_serialized() {
        let limiter = Arc::new(DomainRateLimiter::new(fixed_spacing(0)));

        let permit = limiter.acquire("acme.io", None).await.unwrap();

        let contender = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire("acme.io", None).await.is_ok() })
        };
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!contender.is_finished());

        permit.success(Duration::ZERO);
        assert!(contender.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_domains_are_independent() {
        let limiter = DomainRateLimiter::new(fixed_spacing(5));

        let _held = limiter.acquire("acme.io", None).await.unwrap();
        let start = Instant::now();
        let other = limiter.acquire("other.io", None).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        other.success(Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_state() {
        let limiter = DomainRateLimiter::new(fixed_spacing(1));
        limiter.acquire("foo.com", None).await.unwrap().failure(&timeout());
        limiter.reset("foo.com");
        assert!(limiter.stats("foo.com").await.is_none());
    }
}
