//! Scenario tests driving a headless host end to end

mod lifecycle;
