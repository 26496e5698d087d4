pub const TICK_RATE_MS: u64 = 250;
pub const CHART_WINDOW: usize = 30;

// EventSource default reconnection time
pub const SSE_RETRY_MS: u64 = 3000;
pub const SSE_MIN_RETRY_MS: u64 = 100;

pub const SPEEDTEST_NAMESPACE: &str = "/speedtest";
pub const TRAFFIC_NAMESPACE: &str = "/traffic";
pub const CHART_DATA_PATH: &str = "/chart-data";

pub const START_TEST_EVENT: &str = "start_test";
pub const START_TEST_PAYLOAD: &str = "start_test";
pub const TESTING_EVENT: &str = "testing";
pub const TRAFFIC_EVENT: &str = "traffic";

// Shown for a traffic field the payload did not carry
pub const MISSING_FIELD: &str = "undefined";

pub const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
