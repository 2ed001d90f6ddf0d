#![allow(dead_code)]

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use treeforge_core::api::{
    Builder, BuilderOptions, LegacyErrorInfo, LegacyUnit, ModernUnit, RebuildContext, Resolver,
    TempDirs, Unit, UnitError, UnitFailure, UnitInfo,
};

/// Shared, ordered record of what units did during a test.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries with the given prefix (e.g. `read:`), prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Formatted `tracing` output collected for assertions.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Route this thread's events at `level` and above into the buffer until
    /// the guard drops.
    pub fn install(&self, level: tracing::Level) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(level)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines_containing(&self, needle: &str) -> usize {
        let raw = self.0.lock().unwrap();
        String::from_utf8_lossy(&raw)
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// How a [`TestUnit`] behaves once its inputs are read.
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    Fail(String),
    ThrowString(String),
    NoDirectory,
    /// Read the first two inputs concurrently.
    ReadInParallel,
    /// Start reading the first input, then return without waiting for it.
    ReturnEarly,
    /// Read every input, keep going past failures, return the last error.
    ReadPastFailures,
}

/// A modern unit whose inputs, delay and outcome are scripted by the test.
pub struct TestUnit {
    name: String,
    inputs: Mutex<Vec<Unit>>,
    behavior: Behavior,
    delay: Option<Duration>,
    log: Log,
    on_read: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl TestUnit {
    pub fn new(name: &str, log: &Log) -> Arc<Self> {
        Self::with(name, log, Behavior::Succeed, None)
    }

    pub fn with(name: &str, log: &Log, behavior: Behavior, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            inputs: Mutex::new(Vec::new()),
            behavior,
            delay,
            log: log.clone(),
            on_read: Mutex::new(None),
        })
    }

    pub fn set_inputs(&self, inputs: Vec<Unit>) {
        *self.inputs.lock().unwrap() = inputs;
    }

    /// Run `hook` at the start of every read.
    pub fn on_read(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_read.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn unit(self: &Arc<Self>) -> Unit {
        Unit::Modern(self.clone())
    }

    pub fn output(&self) -> PathBuf {
        PathBuf::from(format!("out/{}", self.name))
    }

    fn inputs(&self) -> Vec<Unit> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModernUnit for TestUnit {
    fn info(&self) -> UnitInfo {
        UnitInfo {
            name: Some("TestUnit".to_string()),
            annotation: Some(self.name.clone()),
            instantiation_stack: Some(format!("at tests/{}.rs:1", self.name)),
            ..UnitInfo::default()
        }
    }

    async fn read(&self, resolver: &Resolver<'_>) -> Result<Option<PathBuf>, UnitError> {
        self.log.push(format!("read:{}", self.name));
        if let Some(hook) = self.on_read.lock().unwrap().as_ref() {
            hook();
        }

        let inputs = self.inputs();
        match &self.behavior {
            Behavior::ReadInParallel => {
                let (a, b) = futures::join!(resolver.read(&inputs[0]), resolver.read(&inputs[1]));
                a?;
                b?;
            }
            Behavior::ReturnEarly => {
                let mut pending = Box::pin(resolver.read(&inputs[0]));
                let _ = futures::poll!(pending.as_mut());
                // Leak the in-flight read so the resolver stays busy.
                std::mem::forget(pending);
                return Ok(Some(self.output()));
            }
            Behavior::ReadPastFailures => {
                let mut last = None;
                for input in &inputs {
                    if let Err(e) = resolver.read(input).await {
                        last = Some(e);
                    }
                }
                if let Some(e) = last {
                    return Err(e.into());
                }
            }
            _ => {
                for input in &inputs {
                    resolver.read(input).await?;
                }
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Fail(message) => Err(UnitFailure::new(message.clone()).into()),
            Behavior::ThrowString(text) => Err(text.as_str().into()),
            Behavior::NoDirectory => Ok(None),
            _ => Ok(Some(self.output())),
        }
    }

    async fn cleanup(&self) -> Result<(), UnitError> {
        self.log.push(format!("cleanup:{}", self.name));
        Ok(())
    }
}

/// A legacy unit that records every rebuild and writes a marker file.
pub struct PurePlugin {
    name: String,
    input: Option<Unit>,
    inputs: Option<Vec<Unit>>,
    fail_with: Option<LegacyErrorInfo>,
    broken: Arc<AtomicBool>,
    log: Log,
}

impl PurePlugin {
    pub fn new(name: &str, inputs: Vec<Unit>, log: &Log) -> Unit {
        Unit::Legacy(Arc::new(Self {
            name: name.to_string(),
            input: None,
            inputs: Some(inputs),
            fail_with: None,
            broken: Arc::default(),
            log: log.clone(),
        }))
    }

    pub fn declaring(name: &str, input: Option<Unit>, inputs: Option<Vec<Unit>>, log: &Log) -> Unit {
        Unit::Legacy(Arc::new(Self {
            name: name.to_string(),
            input,
            inputs,
            fail_with: None,
            broken: Arc::default(),
            log: log.clone(),
        }))
    }

    pub fn failing(name: &str, info: LegacyErrorInfo, log: &Log) -> Unit {
        Unit::Legacy(Arc::new(Self {
            name: name.to_string(),
            input: None,
            inputs: Some(Vec::new()),
            fail_with: Some(info),
            broken: Arc::default(),
            log: log.clone(),
        }))
    }

    /// A plugin whose rebuild fails while the returned switch is set.
    pub fn switchable(name: &str, inputs: Vec<Unit>, log: &Log) -> (Unit, Arc<AtomicBool>) {
        let broken = Arc::new(AtomicBool::new(false));
        let unit = Unit::Legacy(Arc::new(Self {
            name: name.to_string(),
            input: None,
            inputs: Some(inputs),
            fail_with: None,
            broken: broken.clone(),
            log: log.clone(),
        }));
        (unit, broken)
    }
}

#[async_trait]
impl LegacyUnit for PurePlugin {
    fn info(&self) -> UnitInfo {
        UnitInfo::named(self.name.clone())
    }

    fn input(&self) -> Option<Unit> {
        self.input.clone()
    }

    fn inputs(&self) -> Option<Vec<Unit>> {
        self.inputs.clone()
    }

    async fn rebuild(&self, ctx: &RebuildContext) -> Result<(), UnitError> {
        self.log.push(format!("rebuild:{}", self.name));
        if let Some(info) = &self.fail_with {
            return Err(UnitFailure::new(format!("{} broke", self.name))
                .with_legacy_info(info.clone())
                .into());
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(UnitFailure::new(format!("{} is switched off", self.name)).into());
        }
        std::fs::write(ctx.output_path.join(format!("{}.txt", self.name)), &self.name)?;
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), UnitError> {
        self.log.push(format!("cleanup:{}", self.name));
        Ok(())
    }
}

/// Builder whose adapter scratch space lives under a throwaway root.
pub fn builder_in(root: impl Into<Unit>, scratch: &tempfile::TempDir) -> Builder {
    let options = BuilderOptions::default().with_temp(Arc::new(TempDirs::new(scratch.path())));
    Builder::with_options(root, options)
}

/// Hook that cancels `builder` without keeping it alive.
pub fn cancel_hook(builder: &Arc<Builder>) -> impl Fn() + Send + Sync + 'static {
    let weak: Weak<Builder> = Arc::downgrade(builder);
    move || {
        if let Some(builder) = weak.upgrade() {
            builder.cancel();
        }
    }
}
