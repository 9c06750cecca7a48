//! Fake application-log generator.
//!
//! Timer-driven: each tick renders one single-line log entry in the
//! configured style and hands it to the sink. Six template families
//! cover common pipeline shapes, from Java application logs to Apache
//! combined access lines.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::info;

use synthload_core::config::FakeLogKind;

/// Default pause between emitted lines.
pub const EMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Destination for rendered log lines.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes lines straight to stdout, the normal production sink.
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn emit(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{line}");
    }
}

pub struct FakeLogGenerator {
    kind: FakeLogKind,
    emit_interval: Duration,
    sink: Arc<dyn LogSink>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl FakeLogGenerator {
    #[must_use]
    pub fn new(kind: FakeLogKind, sink: Arc<dyn LogSink>) -> Self {
        Self::with_interval(kind, EMIT_INTERVAL, sink)
    }

    #[must_use]
    pub fn with_interval(kind: FakeLogKind, emit_interval: Duration, sink: Arc<dyn LogSink>) -> Self {
        Self {
            kind,
            emit_interval,
            sink,
            cancel: None,
            task: None,
        }
    }

    /// Starts the emitter. A second start while running is a no-op.
    pub fn start(&mut self, parent: &CancellationToken) {
        if self.cancel.is_some() {
            return;
        }
        let cancel = parent.child_token();

        info!(kind = ?self.kind, "starting fake log generator");

        let kind = self.kind;
        let sink = Arc::clone(&self.sink);
        let emit_interval = self.emit_interval;
        let token = cancel.clone();

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(emit_interval);
            let mut rng = SmallRng::from_entropy();

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => sink.emit(&render_line(kind, &mut rng)),
                }
            }
        }));
        self.cancel = Some(cancel);
    }

    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("fake log generator stopped");
    }
}

/// Renders one log line in the given style.
#[must_use]
pub fn render_line(kind: FakeLogKind, rng: &mut SmallRng) -> String {
    match kind {
        FakeLogKind::Java => render_java(rng),
        FakeLogKind::Web => render_web(rng),
        FakeLogKind::Microservice => render_microservice(rng),
        FakeLogKind::Database => render_database(rng),
        FakeLogKind::Ecommerce => render_ecommerce(rng),
        FakeLogKind::Generic => render_generic(rng),
    }
}

const JAVA_CLASSES: &[&str] = &[
    "com.example.service.UserService",
    "com.example.controller.PaymentController",
    "com.example.repository.OrderRepository",
    "com.example.config.DatabaseConfig",
    "com.example.util.CacheManager",
    "org.springframework.boot.SpringApplication",
    "com.example.security.AuthenticationService",
];

const ERRORS: &[&str] = &[
    "Connection timeout after 30s",
    "Invalid JSON format in request body",
    "Database constraint violation",
    "Authentication token expired",
    "Rate limit exceeded",
    "Service temporarily unavailable",
    "Invalid parameter: expected number, got string",
    "Memory allocation failed",
];

fn render_java(rng: &mut SmallRng) -> String {
    let class = JAVA_CLASSES.choose(rng).unwrap();
    match rng.gen_range(0..6) {
        0 => format!(
            "INFO  [main] {class} - Processing user authentication request"
        ),
        1 => format!(
            "DEBUG [http-thread-{}] {class} - Cache miss for key: user_session_{}",
            rng.gen_range(0..20),
            rng.gen_range(0..10_000)
        ),
        2 => format!(
            "WARN  [scheduler-1] {class} - Connection pool running low: {} connections available",
            rng.gen_range(1..=5)
        ),
        3 => format!(
            "ERROR [main] {class} - Failed to process request: {}",
            ERRORS.choose(rng).unwrap()
        ),
        4 => "INFO  [main] o.s.b.w.embedded.tomcat.TomcatWebServer - Tomcat started on port(s): 8080 (http)".to_string(),
        _ => {
            let query = [
                format!("SELECT * FROM users WHERE id = {}", rng.gen_range(0..1_000)),
                format!(
                    "UPDATE orders SET status = 'COMPLETED' WHERE id = {}",
                    rng.gen_range(0..1_000)
                ),
                format!(
                    "INSERT INTO audit_log (action, user_id, timestamp) VALUES ('{}', {}, NOW())",
                    random_token(rng, 6),
                    rng.gen_range(0..1_000)
                ),
                "DELETE FROM sessions WHERE expires_at < NOW()".to_string(),
            ]
            .choose(rng)
            .unwrap()
            .clone();
            format!("DEBUG [HikariPool-1] org.hibernate.SQL - {query}")
        }
    }
}

fn render_web(rng: &mut SmallRng) -> String {
    let method = ["GET", "POST", "PUT", "DELETE", "PATCH"].choose(rng).unwrap();
    let endpoint = [
        "/api/users",
        "/api/orders",
        "/api/products",
        "/api/auth/login",
        "/api/payments",
        "/health",
        "/metrics",
        "/api/search",
    ]
    .choose(rng)
    .unwrap();
    let status = [200, 201, 400, 401, 403, 404, 500, 503].choose(rng).unwrap();

    format!(
        "192.168.1.{} - - [{}] \"{method} {endpoint} HTTP/1.1\" {status} {} \"-\" \"Mozilla/5.0\" {}ms",
        rng.gen_range(1..=254),
        Local::now().format("%d/%b/%Y:%H:%M:%S %z"),
        rng.gen_range(100..50_100),
        rng.gen_range(10..2_010),
    )
}

fn render_microservice(rng: &mut SmallRng) -> String {
    let service = [
        "user-service",
        "order-service",
        "payment-service",
        "notification-service",
        "inventory-service",
        "api-gateway",
    ]
    .choose(rng)
    .unwrap();
    let trace = random_token(rng, 16);
    let span = random_token(rng, 8);

    match rng.gen_range(0..4) {
        0 => format!(
            "INFO  [{service}] [trace={trace},span={span}] Processing request for user: {}",
            rng.gen_range(0..10_000)
        ),
        1 => format!(
            "DEBUG [{service}] [trace={trace},span={span}] Circuit breaker state: CLOSED"
        ),
        2 => format!(
            "WARN  [{service}] [trace={trace},span={span}] Rate limit approaching: {} requests/minute",
            rng.gen_range(800..1_800)
        ),
        _ => format!(
            "ERROR [{service}] [trace={trace},span={span}] Service unavailable: {}",
            ERRORS.choose(rng).unwrap()
        ),
    }
}

fn render_database(rng: &mut SmallRng) -> String {
    let operation = ["SELECT", "INSERT", "UPDATE", "DELETE", "CREATE INDEX", "VACUUM"]
        .choose(rng)
        .unwrap();
    let table = ["users", "orders", "products", "payments", "inventory", "audit_log"]
        .choose(rng)
        .unwrap();
    let duration = rng.gen_range(1..5_001);

    format!(
        "LOG:  duration: {}.{:03} ms  statement: {operation} operation on table {table} affected {} rows",
        duration / 1_000,
        duration % 1_000,
        rng.gen_range(1..=100),
    )
}

fn render_ecommerce(rng: &mut SmallRng) -> String {
    let event = [
        "USER_LOGIN",
        "PRODUCT_VIEW",
        "CART_ADD",
        "CHECKOUT_START",
        "PAYMENT_SUCCESS",
        "ORDER_PLACED",
        "SHIPPING_LABEL_CREATED",
    ]
    .choose(rng)
    .unwrap();

    format!(
        "INFO  [event-processor] Event: {event} | UserId: {} | SessionId: {} | Amount: ${:.2}",
        rng.gen_range(1..=10_000),
        random_token(rng, 32),
        rng.gen_range(0..50_000) as f64 / 100.0,
    )
}

fn render_generic(rng: &mut SmallRng) -> String {
    let level = ["INFO", "WARN", "ERROR", "DEBUG"].choose(rng).unwrap();
    let component = ["auth", "db", "cache", "queue", "scheduler", "monitor"]
        .choose(rng)
        .unwrap();
    let message = [
        "Operation completed successfully".to_string(),
        format!("Processing batch of {} items", rng.gen_range(1..=1_000)),
        "Configuration reloaded".to_string(),
        "Health check passed".to_string(),
        "Cache eviction completed".to_string(),
        "Timeout waiting for response".to_string(),
    ]
    .choose(rng)
    .unwrap()
    .clone();

    format!("{level}  [{component}] {message}")
}

fn random_token(rng: &mut SmallRng, length: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    (0..length)
        .map(|_| *CHARSET.choose(rng).unwrap() as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct BufferSink(Mutex<Vec<String>>);

    impl LogSink for BufferSink {
        fn emit(&self, line: &str) {
            self.0.lock().push(line.to_string());
        }
    }

    #[test]
    fn every_kind_renders_a_single_line() {
        let mut rng = SmallRng::seed_from_u64(1);
        for kind in [
            FakeLogKind::Java,
            FakeLogKind::Web,
            FakeLogKind::Microservice,
            FakeLogKind::Database,
            FakeLogKind::Ecommerce,
            FakeLogKind::Generic,
        ] {
            for _ in 0..50 {
                let line = render_line(kind, &mut rng);
                assert!(!line.is_empty());
                assert!(!line.contains('\n'));
            }
        }
    }

    #[test]
    fn web_lines_use_combined_log_format() {
        let mut rng = SmallRng::seed_from_u64(4);
        let line = render_web(&mut rng);
        assert!(line.starts_with("192.168.1."));
        assert!(line.contains("HTTP/1.1\""));
        assert!(line.contains("\"Mozilla/5.0\""));
    }

    #[test]
    fn microservice_lines_carry_trace_context() {
        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..20 {
            let line = render_microservice(&mut rng);
            assert!(line.contains("[trace="), "missing trace in: {line}");
            assert!(line.contains(",span="), "missing span in: {line}");
        }
    }

    #[tokio::test]
    async fn generator_emits_until_stopped() {
        let sink = Arc::new(BufferSink(Mutex::new(Vec::new())));
        let mut generator = FakeLogGenerator::with_interval(
            FakeLogKind::Generic,
            Duration::from_millis(5),
            Arc::clone(&sink) as Arc<dyn LogSink>,
        );

        let cancel = CancellationToken::new();
        generator.start(&cancel);
        tokio::time::sleep(Duration::from_millis(40)).await;
        generator.stop().await;

        let emitted = sink.0.lock().len();
        assert!(emitted >= 2, "expected several lines, got {emitted}");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.0.lock().len(), emitted, "emitter kept running after stop");
    }
}
