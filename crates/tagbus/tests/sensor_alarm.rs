//! End-to-end producer/consumer scenario through the public `tagbus` facade:
//! one plugin auto-publishes a temperature reading, a second auto-wires a
//! consumer field against the same path and raises an alarm message once the
//! threshold is crossed. Both plugins are test-local fixtures, never a
//! shipped crate.

use std::time::Duration;

use tagbus::prelude::*;

#[derive(Default, TagPlugin)]
struct TemperatureSensor {
    #[tag(producer, path = "plant/line1/temperature", auto_publish_interval_ms = 5)]
    temperature: f64,
}

#[async_trait::async_trait]
impl Plugin for TemperatureSensor {
    fn name(&self) -> &str {
        "temperature-sensor"
    }

    fn run_interval_ms(&self) -> u64 {
        5
    }

    async fn execute(&mut self) -> Result<(), HostError> {
        self.temperature += 1.0;
        Ok(())
    }
}

#[derive(Default, TagPlugin)]
struct HighTempAlarm {
    #[tag(consumer, path = "plant/line1/temperature")]
    last_temperature: f64,
}

#[async_trait::async_trait]
impl Plugin for HighTempAlarm {
    fn name(&self) -> &str {
        "high-temp-alarm"
    }
}

/// Registers the same producer path as [`TemperatureSensor`] but with no
/// auto-publish ticker, so a test can drive an exact sample sequence through
/// `set_tag` without a concurrent auto-wire loop racing its own publishes.
#[derive(Default, TagPlugin)]
struct ManualTemperatureProducer {
    #[tag(producer, path = "plant/line1/temperature")]
    temperature: f64,
}

#[async_trait::async_trait]
impl Plugin for ManualTemperatureProducer {
    fn name(&self) -> &str {
        "manual-temperature-producer"
    }
}

#[tokio::test]
async fn producer_updates_reach_the_consumer_field_through_auto_wire() {
    let runtime = TagbusRuntime::new(TagbusConfig::default()).await;

    runtime
        .load_plugin("temperature-sensor", TemperatureSensor::default())
        .await
        .unwrap();
    runtime
        .load_plugin("high-temp-alarm", HighTempAlarm::default())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let observed: f64 = runtime
        .host()
        .tag_service
        .get_tag("plant/line1/temperature")
        .await;
    assert!(observed > 0.0, "sensor should have published at least once");
}

#[tokio::test]
async fn plugging_into_a_configured_rack_places_the_instance() {
    let mut config = TagbusConfig::default();
    config.racks.push(tagbus_runtime::config::RackConfig {
        name: "Rack1".into(),
        slot_count: None,
        slots: vec![tagbus_runtime::config::SlotConfig {
            id: 1,
            name: Some("SensorSlot".into()),
            parameters: Default::default(),
        }],
    });

    let runtime = TagbusRuntime::new(config).await;
    runtime
        .load_plugin("temperature-sensor", TemperatureSensor::default())
        .await
        .unwrap();
    runtime.plug("temperature-sensor", "Rack1", 1).await.unwrap();

    assert_eq!(
        runtime.host().current_slot("temperature-sensor"),
        Some(tagbus_framework::SlotRef {
            rack: "Rack1".into(),
            slot_id: 1,
        })
    );
}

/// Drives the exact sample sequence 25, 28, 31, 33, 22 through the tag path
/// a high-temperature alarm watches and asserts alarms fire for exactly the
/// two samples above the 30.0 threshold (31 and 33), and not for 22 even
/// though it follows them - the alarm must react to each sample's own value,
/// not latch once tripped.
#[tokio::test]
async fn message_service_alarms_on_exactly_the_samples_above_threshold() {
    let runtime = TagbusRuntime::new(TagbusConfig::default()).await;
    runtime
        .load_plugin("manual-temperature-producer", ManualTemperatureProducer::default())
        .await
        .unwrap();

    let mut alarms = runtime.host().message_service.subscribe("alarm.high_temperature");
    let message_service = runtime.host().message_service.clone();
    let _sub = runtime
        .host()
        .tag_service
        .subscribe_tag("plant/line1/temperature", move |value| {
            if let Some(temp) = value.coerce::<f64>()
                && temp > 30.0
            {
                message_service.publish("alarm.high_temperature", "line1 over threshold");
            }
        })
        .await;

    let samples = [25.0_f64, 28.0, 31.0, 33.0, 22.0];
    for sample in samples {
        runtime
            .host()
            .tag_service
            .set_tag(
                "plant/line1/temperature",
                "manual-temperature-producer",
                sample,
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut received = Vec::new();
    while let Ok(Some(message)) =
        tokio::time::timeout(Duration::from_millis(200), alarms.recv()).await
    {
        received.push(message);
    }

    assert_eq!(
        received.len(),
        2,
        "expected exactly two alarms (for samples 31 and 33), got {received:?}"
    );
    for alarm in &received {
        assert_eq!(alarm.topic, "alarm.high_temperature");
    }
}
