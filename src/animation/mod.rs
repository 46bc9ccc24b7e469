//! Animation engine.
//!
//! While an animation runs it owns the LED buffers of both chips: starting takes a
//! snapshot of the enable and PWM buffers, stopping puts it back. Frames are rendered
//! from [`Animator::tick`] at the configured delay and pushed to the chips.

mod color_cycle;
mod floating_plasma;
pub mod tables;
mod type_o_matic;
mod type_o_raindrops;

use bitflags::bitflags;
use embedded_storage::Storage;

pub use color_cycle::ColorCycleLeftRight;
pub use floating_plasma::{FloatingPlasma, PlasmaVariant};
pub use type_o_matic::TypeOMatic;
pub use type_o_raindrops::TypeORaindrops;

use crate::{
    color::{Hsv, RGB8},
    interface::RegisterAccess,
    log::{debug, info, warn},
    matrix::{DualMatrix, MatrixSnapshot},
    store::{AnimationRecord, BacklightStore},
    Error,
};

/// Millisecond timestamp fed to [`Animator::tick`].
pub type Instant = fugit::TimerInstantU64<1000>;
pub type Duration = fugit::MillisDurationU64;

/// Frame delay for a frame rate.
pub const fn fps_to_delay(fps: u32) -> Duration {
    let fps = if fps == 0 { 1 } else { fps };
    Duration::millis(1000 / fps as u64)
}

bitflags! {
    /// Rendering options an animation may support.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AnimationOptions: u16 {
        const VARIANT_1 = 0b01;
        const VARIANT_2 = 0b10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnimationKind {
    FloatingPlasma,
    ColorCycleLeftRight,
    TypeOMatic,
    TypeORaindrops,
}

impl AnimationKind {
    pub const ALL: [AnimationKind; 4] = [
        AnimationKind::FloatingPlasma,
        AnimationKind::ColorCycleLeftRight,
        AnimationKind::TypeOMatic,
        AnimationKind::TypeORaindrops,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            AnimationKind::FloatingPlasma => "floating plasma",
            AnimationKind::ColorCycleLeftRight => "color cycle left right",
            AnimationKind::TypeOMatic => "type-o-matic",
            AnimationKind::TypeORaindrops => "type-o-raindrops",
        }
    }

    /// Frame delay installed when the animation gets selected.
    pub fn default_delay(self) -> Duration {
        match self {
            AnimationKind::FloatingPlasma | AnimationKind::ColorCycleLeftRight => fps_to_delay(25),
            AnimationKind::TypeOMatic | AnimationKind::TypeORaindrops => fps_to_delay(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSettings {
    pub delay: Duration,
    /// Total run time, zero runs until stopped
    pub duration: Duration,
    pub hsv: Hsv,
    pub hsv2: Hsv,
    pub rgb: RGB8,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        let record = AnimationRecord::default();
        AnimationSettings {
            delay: Duration::millis(record.delay_ms as u64),
            duration: Duration::millis(0),
            hsv: record.hsv,
            hsv2: record.hsv2,
            rgb: record.rgb,
        }
    }
}

/// Hooks of a single animation. All of them work on the buffers only, pushing to the
/// chips is up to the [`Animator`].
pub trait Animation {
    fn start<I>(&mut self, _matrix: &mut DualMatrix<I>, _settings: &AnimationSettings) {}

    fn frame<I>(&mut self, matrix: &mut DualMatrix<I>, settings: &AnimationSettings);

    fn stop<I>(&mut self, _matrix: &mut DualMatrix<I>) {}

    /// Key scan result for matrix `row`, bit `n` set for a pressed key in column `n`.
    fn typematrix_row(&mut self, _row: u8, _bits: u32) {}

    fn supported_options(&self) -> AnimationOptions {
        AnimationOptions::empty()
    }

    fn set_option(&mut self, _option: AnimationOptions) {}

    fn option(&self) -> AnimationOptions {
        AnimationOptions::empty()
    }
}

enum Active {
    FloatingPlasma(FloatingPlasma),
    ColorCycleLeftRight(ColorCycleLeftRight),
    TypeOMatic(TypeOMatic),
    TypeORaindrops(TypeORaindrops),
}

macro_rules! dispatch {
    ($active:expr, $animation:ident => $body:expr) => {
        match $active {
            Active::FloatingPlasma($animation) => $body,
            Active::ColorCycleLeftRight($animation) => $body,
            Active::TypeOMatic($animation) => $body,
            Active::TypeORaindrops($animation) => $body,
        }
    };
}

impl Active {
    fn new(kind: AnimationKind) -> Self {
        match kind {
            AnimationKind::FloatingPlasma => Active::FloatingPlasma(FloatingPlasma::new()),
            AnimationKind::ColorCycleLeftRight => {
                Active::ColorCycleLeftRight(ColorCycleLeftRight::new())
            }
            AnimationKind::TypeOMatic => Active::TypeOMatic(TypeOMatic::new()),
            AnimationKind::TypeORaindrops => Active::TypeORaindrops(TypeORaindrops::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnimationState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Runs at most one animation at a time.
pub struct Animator {
    kind: AnimationKind,
    active: Active,
    settings: AnimationSettings,
    state: AnimationState,
    snapshot: Option<MatrixSnapshot>,
    started_at: Instant,
    last_frame: Option<Instant>,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}

impl Animator {
    pub fn new() -> Self {
        let kind = AnimationKind::FloatingPlasma;
        Animator {
            kind,
            active: Active::new(kind),
            settings: AnimationSettings {
                delay: kind.default_delay(),
                ..AnimationSettings::default()
            },
            state: AnimationState::Stopped,
            snapshot: None,
            started_at: Instant::from_ticks(0),
            last_frame: None,
        }
    }

    pub fn kind(&self) -> AnimationKind {
        self.kind
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == AnimationState::Running
    }

    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut AnimationSettings {
        &mut self.settings
    }

    pub fn set_speed(&mut self, delay_ms: u16) {
        self.settings.delay = Duration::millis(delay_ms as u64);
    }

    pub fn supported_options(&self) -> AnimationOptions {
        dispatch!(&self.active, a => a.supported_options())
    }

    pub fn option(&self) -> AnimationOptions {
        dispatch!(&self.active, a => a.option())
    }

    pub fn set_option(&mut self, option: AnimationOptions) {
        dispatch!(&mut self.active, a => a.set_option(option))
    }

    /// Forwards a key scan row to the running animation.
    pub fn typematrix_row(&mut self, row: u8, bits: u32) {
        if self.is_running() {
            dispatch!(&mut self.active, a => a.typematrix_row(row, bits))
        }
    }

    /// Takes a snapshot of both chips, enables every LED and pushes the buffers.
    /// With `blank` set the PWM buffers are cleared first.
    pub fn prepare<I, IE>(&mut self, matrix: &mut DualMatrix<I>, blank: bool) -> Result<(), Error<IE>>
    where
        I: RegisterAccess<Error = Error<IE>>,
    {
        self.snapshot = Some(matrix.snapshot());

        matrix.enable_all_leds();
        if blank {
            matrix.fill(0);
        }

        matrix.update_pwm()?;
        matrix.update_enable()
    }

    /// Puts the snapshot taken by [`Animator::prepare`] back and pushes it.
    pub fn postpare<I, IE>(&mut self, matrix: &mut DualMatrix<I>) -> Result<(), Error<IE>>
    where
        I: RegisterAccess<Error = Error<IE>>,
    {
        let Some(snapshot) = self.snapshot.take() else {
            warn!("animation: nothing to restore");
            return Ok(());
        };

        matrix.restore(&snapshot);
        matrix.update_pwm()?;
        matrix.update_enable()
    }

    /// Starts the selected animation, stopping a running one first.
    pub fn start<I, IE>(&mut self, matrix: &mut DualMatrix<I>, now: Instant) -> Result<(), Error<IE>>
    where
        I: RegisterAccess<Error = Error<IE>>,
    {
        if self.state != AnimationState::Stopped {
            self.stop(matrix)?;
        }

        info!("animation: start {}", self.kind.name());
        self.state = AnimationState::Starting;
        if let Err(e) = self.prepare(matrix, true) {
            if let Some(snapshot) = self.snapshot.take() {
                matrix.restore(&snapshot);
            }
            self.state = AnimationState::Stopped;
            return Err(e);
        }

        let settings = self.settings;
        dispatch!(&mut self.active, a => a.start(matrix, &settings));

        self.started_at = now;
        self.last_frame = None;
        self.state = AnimationState::Running;
        Ok(())
    }

    pub fn stop<I, IE>(&mut self, matrix: &mut DualMatrix<I>) -> Result<(), Error<IE>>
    where
        I: RegisterAccess<Error = Error<IE>>,
    {
        if self.state == AnimationState::Stopped {
            return Ok(());
        }

        info!("animation: stop {}", self.kind.name());
        self.state = AnimationState::Stopping;
        dispatch!(&mut self.active, a => a.stop(matrix));

        let result = self.postpare(matrix);
        self.state = AnimationState::Stopped;
        result
    }

    /// Renders and pushes a frame when the frame delay has passed since the last one.
    /// Returns whether a frame was drawn.
    pub fn tick<I, IE>(&mut self, matrix: &mut DualMatrix<I>, now: Instant) -> Result<bool, Error<IE>>
    where
        I: RegisterAccess<Error = Error<IE>>,
    {
        if !self.is_running() {
            return Ok(false);
        }

        if self.settings.duration.ticks() != 0 {
            let elapsed = now.checked_duration_since(self.started_at);
            if matches!(elapsed, Some(elapsed) if elapsed >= self.settings.duration) {
                self.stop(matrix)?;
                return Ok(false);
            }
        }

        if let Some(last) = self.last_frame {
            match now.checked_duration_since(last) {
                Some(elapsed) if elapsed >= self.settings.delay => {}
                _ => return Ok(false),
            }
        }

        let settings = self.settings;
        dispatch!(&mut self.active, a => a.frame(matrix, &settings));
        matrix.update_pwm()?;
        self.last_frame = Some(now);
        Ok(true)
    }

    /// Selects `kind`, stopping a running animation. The frame delay is reset to the
    /// animation's default, colours are kept.
    pub fn set_animation<I, IE>(
        &mut self,
        kind: AnimationKind,
        matrix: &mut DualMatrix<I>,
    ) -> Result<(), Error<IE>>
    where
        I: RegisterAccess<Error = Error<IE>>,
    {
        self.stop(matrix)?;

        debug!("animation: select {}", kind.name());
        self.kind = kind;
        self.active = Active::new(kind);
        self.settings.delay = kind.default_delay();
        self.settings.duration = Duration::millis(0);
        Ok(())
    }

    pub fn record(&self) -> AnimationRecord {
        AnimationRecord {
            kind: self.kind.to_u8(),
            delay_ms: self.settings.delay.ticks().min(u16::MAX as u64) as u16,
            hsv: self.settings.hsv,
            hsv2: self.settings.hsv2,
            rgb: self.settings.rgb,
        }
    }

    pub fn save_state<S: Storage>(&self, store: &mut BacklightStore<S>) -> Result<(), S::Error> {
        store.write_animation(&self.record())
    }

    /// Loads the stored animation and its settings. A stopped animator stays stopped.
    /// Returns `false` when the store holds no valid animation.
    pub fn load_state<I, IE, S: Storage>(
        &mut self,
        matrix: &mut DualMatrix<I>,
        store: &mut BacklightStore<S>,
    ) -> Result<bool, LoadError<IE, S::Error>>
    where
        I: RegisterAccess<Error = Error<IE>>,
    {
        let record = store.read_animation().map_err(LoadError::Storage)?;
        let Some(kind) = AnimationKind::from_u8(record.kind) else {
            warn!("animation: no valid animation stored ({})", record.kind);
            return Ok(false);
        };

        self.set_animation(kind, matrix).map_err(LoadError::Device)?;
        self.settings.delay = Duration::millis(record.delay_ms as u64);
        self.settings.hsv = record.hsv;
        self.settings.hsv2 = record.hsv2;
        self.settings.rgb = record.rgb;
        Ok(true)
    }
}

/// Failure of [`Animator::load_state`].
#[derive(Debug)]
pub enum LoadError<IE, SE> {
    Device(Error<IE>),
    Storage(SE),
}

/// Scales `value` by `level / 255`.
pub(crate) fn scale(value: u8, level: u8) -> u8 {
    ((value as u16 * level as u16) / 255) as u8
}
