use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use webthings_drivers::{PowerReading, ReadError, SensorDriver, ThermalReading};

use indexmap::IndexMap;

use crate::description::{BATTERY_CHARGE, TEMPERATURE, ThingDescription, VOLTAGE_IN, VOLTAGE_OUT};
use crate::error::{Error, ErrorKind, Result};
use crate::reporter::{Reporter, TracingReporter};
use crate::scheduler::{PollingScheduler, SchedulerState};
use crate::sink::{PropertySink, PropertyValue, Value};

/// A reading that can be split into published property values.
pub trait Publishable: Debug + Send + 'static {
    /// Returns the property values of the reading, in publication order.
    fn fields(&self) -> Vec<(&'static str, PropertyValue)>;
}

impl Publishable for ThermalReading {
    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![(TEMPERATURE, self.celsius().into())]
    }
}

impl Publishable for PowerReading {
    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            (VOLTAGE_IN, self.input_voltage().into()),
            (VOLTAGE_OUT, self.output_voltage().into()),
            (BATTERY_CHARGE, self.battery_charge_pct().into()),
        ]
    }
}

type Sinks = IndexMap<&'static str, Arc<dyn PropertySink>>;

/// A thing that polls one driver and publishes every field of its readings
/// to the sink bound to that field.
///
/// Process shutdown must be forwarded to the thing through
/// [`cancel_update_task`](Self::cancel_update_task) or
/// [`shutdown`](Self::shutdown).
pub struct DeviceThing {
    description: ThingDescription,
    sinks: Sinks,
    reporter: Arc<dyn Reporter>,
    scheduler: PollingScheduler,
}

impl DeviceThing {
    /// Creates a [`DeviceThing`] from its [`ThingDescription`].
    ///
    /// Outcomes are reported through a [`TracingReporter`].
    #[must_use]
    pub fn new(description: ThingDescription) -> Self {
        Self {
            description,
            sinks: IndexMap::new(),
            reporter: Arc::new(TracingReporter),
            scheduler: PollingScheduler::new(),
        }
    }

    /// Sets the [`Reporter`] receiving readings and failures.
    #[must_use]
    pub fn reporter(mut self, reporter: impl Reporter) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Binds a [`PropertySink`] to a described property.
    ///
    /// A sink already bound to the same property is replaced.
    ///
    /// # Errors
    ///
    /// An error is returned if:
    /// - The property is not part of the thing description
    /// - The update task has already been started
    pub fn bind<S: PropertySink + 'static>(mut self, property: &str, sink: Arc<S>) -> Result<Self> {
        if self.scheduler.state() != SchedulerState::Idle {
            return Err(Error::new(
                ErrorKind::Binding,
                format!(
                    "Unable to bind `{property}` to a {} thing",
                    self.scheduler.state()
                ),
            ));
        }

        let Some((name, _)) = self.description.properties.get_key_value(property) else {
            return Err(Error::new(
                ErrorKind::Binding,
                format!(
                    "The property `{property}` is not described by `{}`",
                    self.description.id
                ),
            ));
        };

        let _ = self.sinks.insert(*name, sink);
        Ok(self)
    }

    /// Binds a new [`Value`] to every described property without a sink.
    ///
    /// Returns the thing together with the created values, so that the
    /// exposure layer can subscribe to them.
    #[must_use]
    pub fn bind_values(mut self) -> (Self, IndexMap<&'static str, Arc<Value>>) {
        let mut values = IndexMap::new();

        for name in self.description.properties.keys() {
            if self.sinks.contains_key(name) {
                continue;
            }

            let value = Arc::new(Value::default());
            let _ = self.sinks.insert(*name, Arc::clone(&value) as Arc<dyn PropertySink>);
            let _ = values.insert(*name, value);
        }

        (self, values)
    }

    /// Returns the [`ThingDescription`].
    #[must_use]
    pub const fn description(&self) -> &ThingDescription {
        &self.description
    }

    /// Returns the [`SchedulerState`] of the update task.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Starts the update task, reading `driver` every `interval`.
    ///
    /// Every field of a reading is published to its sink. Read and publish
    /// failures are reported and never stop the task.
    ///
    /// # Errors
    ///
    /// An error is returned if the update task cannot be started.
    pub fn start<D>(&mut self, driver: D, interval: Duration) -> Result<()>
    where
        D: SensorDriver,
        D::Reading: Publishable,
    {
        let thing = self.description.id;

        let sinks = self.sinks.clone();
        let reporter = Arc::clone(&self.reporter);
        let on_reading = move |reading: D::Reading| {
            publish_reading(thing, &reading, &sinks, reporter.as_ref());
        };

        let reporter = Arc::clone(&self.reporter);
        let on_error = move |error: ReadError| reporter.read_failed(thing, &error);

        self.scheduler.start(driver, on_reading, on_error, interval)
    }

    /// Cancels the update task.
    ///
    /// No value is published after this call.
    pub fn cancel_update_task(&mut self) {
        self.scheduler.cancel();
    }

    /// Cancels the update task and waits for it to terminate.
    pub async fn shutdown(self) {
        self.scheduler.stop().await;
    }
}

fn publish_reading<R: Publishable>(
    thing: &str,
    reading: &R,
    sinks: &Sinks,
    reporter: &dyn Reporter,
) {
    reporter.reading(thing, reading);

    for (property, value) in reading.fields() {
        let Some(sink) = sinks.get(property) else {
            let error = Error::new(
                ErrorKind::Binding,
                format!("No sink bound to `{property}`"),
            );
            reporter.publish_failed(thing, property, &error);
            continue;
        };

        if let Err(e) = sink.publish(value) {
            reporter.publish_failed(thing, property, &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use webthings_drivers::{PowerReading, ReadError, SensorDriver, ThermalReading};

    use tokio::sync::mpsc;

    use crate::description::{
        BATTERY_CHARGE, TEMPERATURE, ThingDescription, VOLTAGE_IN, VOLTAGE_OUT,
    };
    use crate::error::{Error, ErrorKind, Result};
    use crate::reporter::Reporter;
    use crate::scheduler::SchedulerState;
    use crate::sink::{PropertySink, PropertyValue, Value};

    use super::{DeviceThing, Publishable};

    const INTERVAL: Duration = Duration::from_millis(5000);

    #[derive(Debug, PartialEq)]
    enum Report {
        Reading,
        ReadFailed(String),
        PublishFailed(String, ErrorKind),
    }

    struct ChannelReporter(mpsc::UnboundedSender<Report>);

    impl Reporter for ChannelReporter {
        fn reading(&self, _thing: &str, _reading: &dyn Debug) {
            self.0.send(Report::Reading).unwrap();
        }

        fn read_failed(&self, _thing: &str, error: &ReadError) {
            self.0.send(Report::ReadFailed(error.to_string())).unwrap();
        }

        fn publish_failed(&self, _thing: &str, property: &str, error: &Error) {
            self.0
                .send(Report::PublishFailed(property.to_owned(), error.kind()))
                .unwrap();
        }
    }

    struct FailingSink;

    impl PropertySink for FailingSink {
        fn publish(&self, _value: PropertyValue) -> Result<()> {
            Err(Error::new(ErrorKind::Publish, "Observers are gone"))
        }
    }

    // Returns a scripted sequence of readings, then fails.
    struct ScriptedDriver<T> {
        readings: Mutex<Vec<T>>,
    }

    impl<T> ScriptedDriver<T> {
        fn new(mut readings: Vec<T>) -> Self {
            readings.reverse();
            Self {
                readings: Mutex::new(readings),
            }
        }
    }

    impl<T: Send + 'static> SensorDriver for ScriptedDriver<T> {
        type Reading = T;

        fn name(&self) -> &str {
            "scripted"
        }

        fn read(&self) -> std::result::Result<T, ReadError> {
            self.readings
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ReadError::Timeout { attempts: 50 })
        }
    }

    fn thermometer() -> (DeviceThing, mpsc::UnboundedReceiver<Report>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let thing = DeviceThing::new(ThingDescription::thermometer()).reporter(ChannelReporter(tx));
        (thing, rx)
    }

    #[test]
    fn test_fields() {
        let thermal = ThermalReading::from_celsius(23.125);
        assert_eq!(
            thermal.fields(),
            [(TEMPERATURE, PropertyValue::Number(23.125))]
        );

        let power = PowerReading::new(230.0, 229.5, 95).unwrap();
        assert_eq!(
            power.fields(),
            [
                (VOLTAGE_IN, PropertyValue::Number(230.0)),
                (VOLTAGE_OUT, PropertyValue::Number(229.5)),
                (BATTERY_CHARGE, PropertyValue::Integer(95)),
            ]
        );
    }

    #[test]
    fn test_bind_unknown_property() {
        let err = DeviceThing::new(ThingDescription::thermometer())
            .bind(VOLTAGE_IN, Arc::new(Value::default()))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Binding);
    }

    #[test]
    fn test_bind_values_skips_bound_properties() {
        let (thing, values) = DeviceThing::new(ThingDescription::ups())
            .bind(VOLTAGE_IN, Arc::new(FailingSink))
            .unwrap()
            .bind_values();

        assert_eq!(
            values.keys().copied().collect::<Vec<_>>(),
            [VOLTAGE_OUT, BATTERY_CHARGE]
        );
        assert_eq!(thing.sinks.len(), 3);
        assert_eq!(thing.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_after_start() {
        let (thing, _reports) = thermometer();
        let mut thing = thing.bind(TEMPERATURE, Arc::new(Value::default())).unwrap();

        thing
            .start(ScriptedDriver::<ThermalReading>::new(Vec::new()), INTERVAL)
            .unwrap();

        let err = thing
            .bind(TEMPERATURE, Arc::new(FailingSink))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Binding);
        assert_eq!(
            err.description(),
            "Unable to bind `temp` to a running thing"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_thermometer_publishes_temperature() {
        let (thing, mut reports) = thermometer();
        let (mut thing, values) = thing.bind_values();

        let mut temperature = values[TEMPERATURE].subscribe();

        let driver = ScriptedDriver::new(vec![
            ThermalReading::from_celsius(23.125),
            ThermalReading::from_celsius(-4.5),
        ]);
        thing.start(driver, INTERVAL).unwrap();
        assert_eq!(thing.state(), SchedulerState::Running);

        temperature.changed().await.unwrap();
        assert_eq!(
            *temperature.borrow_and_update(),
            PropertyValue::Number(23.125)
        );

        temperature.changed().await.unwrap();
        assert_eq!(*temperature.borrow_and_update(), PropertyValue::Number(-4.5));

        assert_eq!(reports.recv().await.unwrap(), Report::Reading);
        assert_eq!(reports.recv().await.unwrap(), Report::Reading);

        // The script is over: the failure is reported and polling continues.
        assert_eq!(
            reports.recv().await.unwrap(),
            Report::ReadFailed("device not ready after 50 attempts".into())
        );
        assert!(matches!(
            reports.recv().await.unwrap(),
            Report::ReadFailed(_)
        ));
        assert_eq!(values[TEMPERATURE].get(), PropertyValue::Number(-4.5));

        thing.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failures_are_reported() {
        let (tx, mut reports) = mpsc::unbounded_channel();
        let charge = Arc::new(Value::default());

        let mut thing = DeviceThing::new(ThingDescription::ups())
            .reporter(ChannelReporter(tx))
            .bind(VOLTAGE_IN, Arc::new(FailingSink))
            .unwrap()
            .bind(BATTERY_CHARGE, Arc::clone(&charge))
            .unwrap();

        let driver = ScriptedDriver::new(vec![PowerReading::new(230.0, 229.5, 95).unwrap()]);
        thing.start(driver, INTERVAL).unwrap();

        assert_eq!(reports.recv().await.unwrap(), Report::Reading);
        assert_eq!(
            reports.recv().await.unwrap(),
            Report::PublishFailed(VOLTAGE_IN.into(), ErrorKind::Publish)
        );
        assert_eq!(
            reports.recv().await.unwrap(),
            Report::PublishFailed(VOLTAGE_OUT.into(), ErrorKind::Binding)
        );

        // The remaining fields are still published.
        assert_eq!(charge.get(), PropertyValue::Integer(95));

        thing.cancel_update_task();
        assert_eq!(thing.state(), SchedulerState::Cancelled);
        thing.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_published_after_cancel() {
        let (thing, _reports) = thermometer();
        let (mut thing, values) = thing.bind_values();

        let driver = ScriptedDriver::new(vec![ThermalReading::from_celsius(20.0)]);
        thing.start(driver, INTERVAL).unwrap();
        thing.cancel_update_task();

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(values[TEMPERATURE].get(), PropertyValue::Number(0.0));

        thing.shutdown().await;
    }
}
