//! Human readable commands of the serial control channel.
//!
//! A command line is `!name arg...\n`. Every command replies `exec: name` followed by
//! its own output and `OK` or `cmd failed!`.

use core::str::FromStr;

use arrayvec::ArrayVec;
use embedded_io::{Write, WriteFmtError};
use embedded_storage::Storage;

use crate::{
    animation::{AnimationKind, AnimationOptions},
    backlight::{Backlight, CommandError},
    color::{Hsv, RGB8},
    interface::RegisterAccess,
    led_map::{self, Device, MATRIX_COLS, MATRIX_ROWS},
    log::{info, warn},
    sector::SECTOR_MAX,
    Error, CS, ENABLE_SIZE, SW,
};

/// Arguments accepted after the command name.
pub const MAX_ARGS: usize = 10;

pub type Args<'a> = ArrayVec<&'a str, MAX_ARGS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UserCommand {
    Help,
    Info,
    Init,
    Issi,
    Led,
    Pwm,
    Rgb,
    Hsv,
    Sector,
    Animation,
    LedMap,
    BacklightEepromClear,
}

pub struct CommandInfo {
    pub name: &'static str,
    pub command: UserCommand,
    pub args: &'static str,
    pub help: &'static str,
}

const fn entry(
    name: &'static str,
    command: UserCommand,
    args: &'static str,
    help: &'static str,
) -> CommandInfo {
    CommandInfo {
        name,
        command,
        args,
        help,
    }
}

pub static COMMANDS: &[CommandInfo] = &[
    entry("help", UserCommand::Help, "", "show help"),
    entry("h", UserCommand::Help, "", "show help"),
    entry("?", UserCommand::Help, "", "show help"),
    entry("info", UserCommand::Info, "", "show info"),
    entry("init", UserCommand::Init, "", "init both chips"),
    entry("bleeprom", UserCommand::BacklightEepromClear, "", "clear backlight store"),
    entry("sector", UserCommand::Sector, "save | map n | id [on [h s v]]", "set sector"),
    entry(
        "animation",
        UserCommand::Animation,
        "save | option n | delay | id run | pos h s v",
        "set animation",
    ),
    entry("issi", UserCommand::Issi, "cmd dev [v]", "test chip"),
    entry("led", UserCommand::Led, "dev cs sw on", "enable/disable led"),
    entry("pwm", UserCommand::Pwm, "dev cs sw bri", "set pwm"),
    entry("rgb", UserCommand::Rgb, "dev row col r g b", "set rgb"),
    entry("hsv", UserCommand::Hsv, "dev row col h s v", "set hsv"),
    entry("ledmap", UserCommand::LedMap, "", "dump led map"),
];

/// First table entry named exactly `name`.
pub fn lookup(name: &str) -> Option<&'static CommandInfo> {
    COMMANDS.iter().find(|info| info.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    NotUtf8,
    Empty,
    TooManyArguments,
}

/// Splits a command line into name and arguments. Runs of spaces and a trailing `\r`
/// are ignored.
pub fn parse_line(line: &[u8]) -> Result<(&str, Args<'_>), ParseError> {
    let line = core::str::from_utf8(line).map_err(|_| ParseError::NotUtf8)?;
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut tokens = line.split(' ').filter(|token| !token.is_empty());
    let name = tokens.next().ok_or(ParseError::Empty)?;

    let mut args = Args::new();
    for token in tokens {
        args.try_push(token)
            .map_err(|_| ParseError::TooManyArguments)?;
    }

    Ok((name, args))
}

/// An argument is missing, not a number or out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentError;

impl<IE, SE> From<ArgumentError> for CommandError<IE, SE> {
    fn from(_: ArgumentError) -> Self {
        CommandError::Arguments
    }
}

fn number<T: FromStr>(arg: &str) -> Result<T, ArgumentError> {
    arg.parse().map_err(|_| ArgumentError)
}

fn flag(arg: &str) -> Result<bool, ArgumentError> {
    Ok(number::<u8>(arg)? != 0)
}

fn device(arg: &str) -> Result<Device, ArgumentError> {
    Ok(Device::from_wire(number(arg)?))
}

/// CS and SW line of a single LED.
fn led(cs: &str, sw: &str) -> Result<(u8, u8), ArgumentError> {
    let (cs, sw): (u8, u8) = (number(cs)?, number(sw)?);
    if (cs as usize) < CS && (sw as usize) < SW {
        Ok((cs, sw))
    } else {
        Err(ArgumentError)
    }
}

fn hsv(h: &str, s: &str, v: &str) -> Result<Hsv, ArgumentError> {
    Ok(Hsv::new(number(h)?, number(s)?, number(v)?))
}

fn device_name(device: Device) -> &'static str {
    match device {
        Device::Upper => "upper",
        Device::Lower => "lower",
    }
}

/// Writes `bytes` in hex, `per_line` bytes per line prefixed with the line number.
fn dump<W: Write>(
    tx: &mut W,
    bytes: &[u8],
    per_line: usize,
) -> Result<(), WriteFmtError<W::Error>> {
    for (sw, line) in bytes.chunks(per_line).enumerate() {
        write!(tx, "{:2}:", sw)?;
        for byte in line {
            write!(tx, " {:02X}", byte)?;
        }
        writeln!(tx)?;
    }

    Ok(())
}

type CommandResult<IE, SE> = Result<(), CommandError<IE, SE>>;

impl<I, IE, S> Backlight<I, S>
where
    I: RegisterAccess<Error = Error<IE>>,
    S: Storage,
{
    /// Runs a console line received without its `!` and newline.
    ///
    /// Failed commands are reported to the host. Only a reply that cannot be written
    /// is returned as [`CommandError::Output`], and it stops the line.
    pub(crate) fn run_console_line<W: Write>(
        &mut self,
        line: &[u8],
        tx: &mut W,
    ) -> CommandResult<IE, S::Error> {
        let (name, args) = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("console: {:?}", e);
                writeln!(tx, "cmd failed!")?;
                return Ok(());
            }
        };

        let Some(info) = lookup(name) else {
            warn!("console: unknown command {}", name);
            writeln!(tx, "unknown command: {}", name)?;
            return Ok(());
        };

        writeln!(tx, "exec: {}", info.name)?;
        match self.run_user_command(info.command, &args, tx) {
            Ok(()) => writeln!(tx, "OK")?,
            Err(CommandError::Output) => return Err(CommandError::Output),
            Err(_) => {
                warn!("console: {} failed", info.name);
                writeln!(tx, "cmd failed!")?;
            }
        }

        Ok(())
    }

    pub fn run_user_command<W: Write>(
        &mut self,
        command: UserCommand,
        args: &[&str],
        tx: &mut W,
    ) -> CommandResult<IE, S::Error> {
        match command {
            UserCommand::Help => self.help(tx),
            UserCommand::Info => self.info(tx),
            UserCommand::Init => {
                writeln!(tx, "init both chips")?;
                self.matrix.init()?;
                self.show_sectors();
                self.matrix.update()?;
                Ok(())
            }
            UserCommand::Issi => self.issi(args, tx),
            UserCommand::Led => {
                let [dev, cs, sw, on] = args else {
                    return Err(CommandError::Arguments);
                };
                let (dev, (cs, sw), on) = (device(dev)?, led(cs, sw)?, flag(on)?);
                writeln!(tx, "set led: dev:{}, cs:{}, sw:{}, on:{}", dev.to_wire(), cs, sw, on as u8)?;

                let chip = self.matrix.device_mut(dev).device_mut();
                chip.buffer_mut().set_led(cs, sw, on);
                chip.update_enable()?;
                Ok(())
            }
            UserCommand::Pwm => {
                let [dev, cs, sw, pwm] = args else {
                    return Err(CommandError::Arguments);
                };
                let (dev, (cs, sw), pwm) = (device(dev)?, led(cs, sw)?, number::<u8>(pwm)?);
                writeln!(tx, "set pwm: dev:{}, cs:{}, sw:{}, pwm:{}", dev.to_wire(), cs, sw, pwm)?;

                let chip = self.matrix.device_mut(dev).device_mut();
                chip.buffer_mut().set_pwm(cs, sw, pwm);
                chip.update_pwm()?;
                Ok(())
            }
            UserCommand::Rgb => {
                let [dev, row, col, r, g, b] = args else {
                    return Err(CommandError::Arguments);
                };
                let (dev, row, col) = (device(dev)?, number::<u8>(row)?, number::<u8>(col)?);
                let rgb = RGB8::new(number(r)?, number(g)?, number(b)?);
                writeln!(
                    tx,
                    "set RGB: dev:{}, r:{}, c:{}, r:{}, g:{}, b:{}",
                    dev.to_wire(),
                    row,
                    col,
                    rgb.r,
                    rgb.g,
                    rgb.b
                )?;

                let chip = self.matrix.device_mut(dev);
                chip.set_pixel_rgb(row, col, rgb);
                chip.device_mut().update_pwm()?;
                Ok(())
            }
            UserCommand::Hsv => {
                let [dev, row, col, h, s, v] = args else {
                    return Err(CommandError::Arguments);
                };
                let (dev, row, col) = (device(dev)?, number::<u8>(row)?, number::<u8>(col)?);
                let color = hsv(h, s, v)?;
                writeln!(
                    tx,
                    "set HSV: dev:{}, r:{}, c:{}, h:{}, s:{}, v:{}",
                    dev.to_wire(),
                    row,
                    col,
                    color.h,
                    color.s,
                    color.v
                )?;

                let chip = self.matrix.device_mut(dev);
                chip.set_pixel_hsv(row, col, color);
                chip.device_mut().update_pwm()?;
                Ok(())
            }
            UserCommand::Sector => self.sector(args, tx),
            UserCommand::Animation => self.animation(args, tx),
            UserCommand::LedMap => self.led_map(tx),
            UserCommand::BacklightEepromClear => {
                writeln!(tx, "backlight store clear")?;
                self.sectors
                    .clear_store(&mut self.store)
                    .map_err(CommandError::Storage)
            }
        }
    }

    fn help<W: Write>(&mut self, tx: &mut W) -> CommandResult<IE, S::Error> {
        writeln!(tx, "all commands start with '!'")?;
        for info in COMMANDS {
            writeln!(tx, "{} [{}]: {}", info.name, info.args, info.help)?;
        }

        Ok(())
    }

    fn info<W: Write>(&mut self, tx: &mut W) -> CommandResult<IE, S::Error> {
        writeln!(tx, "{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))?;
        for dev in [Device::Upper, Device::Lower] {
            let chip = self.matrix.device(dev).device();
            writeln!(
                tx,
                "{}: gcc:{}, master:{}, cr:{:02X}",
                device_name(dev),
                chip.gcc(),
                chip.is_master() as u8,
                chip.config_register()
            )?;
        }
        writeln!(
            tx,
            "sector: selected:{}, map:{}",
            self.sectors.cursor(),
            self.sectors.custom_map()
        )?;
        writeln!(
            tx,
            "animation: {}, running:{}",
            self.animator.kind().name(),
            self.animator.is_running() as u8
        )?;

        Ok(())
    }

    fn issi<W: Write>(&mut self, args: &[&str], tx: &mut W) -> CommandResult<IE, S::Error> {
        match args {
            ["init", dev] => {
                let dev = device(dev)?;
                writeln!(tx, "init {} chip", device_name(dev))?;
                self.matrix.reinit(dev)?;
            }
            ["pwm", dev] => {
                let buffer = self.matrix.device(device(dev)?).device().buffer();
                writeln!(tx, "pwm buffer")?;
                dump(tx, buffer.pwm_buffer(), CS)?;
            }
            ["led", dev] => {
                let buffer = self.matrix.device(device(dev)?).device().buffer();
                writeln!(tx, "led buffer")?;
                dump(tx, buffer.led_buffer(), ENABLE_SIZE / SW)?;
            }
            [scan @ ("open" | "short"), dev] => {
                let chip = self.matrix.device_mut(device(dev)?).device_mut();
                let saved = chip.buffer().clone();

                chip.detect_open_short()?;
                let states = if *scan == "open" {
                    chip.read_open_states()?
                } else {
                    chip.read_short_states()?
                };

                // the scan overwrote buffers and current
                *chip.buffer_mut() = saved;
                chip.update_global_current()?;
                chip.update()?;

                writeln!(tx, "{} leds: {}", scan, states.count())?;
                dump(tx, &states.0, ENABLE_SIZE / SW)?;
            }
            ["gcc", dev, gcc] => {
                let (dev, gcc) = (device(dev)?, number::<u8>(gcc)?);
                writeln!(tx, "gcc: {}", gcc)?;
                self.matrix
                    .device_mut(dev)
                    .device_mut()
                    .set_global_current(gcc)?;
            }
            ["hsd", dev, enable] => {
                let (dev, enable) = (device(dev)?, flag(enable)?);
                writeln!(tx, "hsd: {}", enable as u8)?;
                self.matrix
                    .device_mut(dev)
                    .device_mut()
                    .hardware_shutdown(enable)?;
            }
            ["ssd", dev, enable] => {
                let (dev, enable) = (device(dev)?, flag(enable)?);
                writeln!(tx, "ssd: {}", enable as u8)?;
                self.matrix
                    .device_mut(dev)
                    .device_mut()
                    .software_shutdown(enable)?;
            }
            _ => return Err(CommandError::Arguments),
        }

        Ok(())
    }

    fn sector<W: Write>(&mut self, args: &[&str], tx: &mut W) -> CommandResult<IE, S::Error> {
        match args {
            [] => {
                writeln!(
                    tx,
                    "sector state: selected:{}, map:{}",
                    self.sectors.cursor(),
                    self.sectors.custom_map()
                )?;
                for id in 0..SECTOR_MAX as u8 {
                    let color = self.sectors.color(id).unwrap_or_default();
                    writeln!(
                        tx,
                        "\tsector {}: enabled:{}, h:{}, s:{}, v:{}",
                        id,
                        self.sectors.is_enabled(id) as u8,
                        color.h,
                        color.s,
                        color.v
                    )?;
                }
            }
            ["save"] => {
                writeln!(tx, "save state")?;
                self.sectors
                    .save_state(&mut self.store)
                    .map_err(CommandError::Storage)?;
            }
            ["map", map] => {
                let map = number::<u8>(map)?;
                writeln!(tx, "custom map {}", map)?;
                self.sectors
                    .set_custom_map(map, &mut self.matrix, &mut self.store)
                    .map_err(CommandError::Storage)?;
                self.matrix.update()?;
            }
            [id] => {
                let id = number::<u8>(id)?;
                writeln!(tx, "{}: enabled:{}", id, self.sectors.is_enabled(id) as u8)?;
            }
            [id, on, color @ ..] => {
                let (id, on) = (number::<u8>(id)?, flag(on)?);
                let color = match color {
                    [] => None,
                    [h, s, v] => Some(hsv(h, s, v)?),
                    _ => return Err(CommandError::Arguments),
                };

                self.sectors
                    .select(id, &mut self.matrix)
                    .map_err(|_| CommandError::Arguments)?;
                self.sectors.set_selected_enabled(on, &mut self.matrix);
                writeln!(tx, "{}: enabled:{}", id, self.sectors.is_enabled(id) as u8)?;

                if let Some(color) = color {
                    self.sectors
                        .set_selected_hsv_color(color, &mut self.matrix);
                    writeln!(
                        tx,
                        "{}: set HSV: h:{}, s:{}, v:{}",
                        id, color.h, color.s, color.v
                    )?;
                }
                self.matrix.update()?;
            }
        }

        Ok(())
    }

    fn animation<W: Write>(&mut self, args: &[&str], tx: &mut W) -> CommandResult<IE, S::Error> {
        match args {
            [] => {
                let settings = self.animator.settings();
                writeln!(
                    tx,
                    "animation: {}, running:{}",
                    self.animator.kind().to_u8(),
                    self.animator.is_running() as u8
                )?;
                writeln!(
                    tx,
                    "\t delay:{}, duration:{}",
                    settings.delay.ticks(),
                    settings.duration.ticks()
                )?;
                for (name, color) in [("hsv1", settings.hsv), ("hsv2", settings.hsv2)] {
                    writeln!(
                        tx,
                        "\t {}: h:{}, s:{}, v:{}",
                        name, color.h, color.s, color.v
                    )?;
                }
                let rgb = settings.rgb;
                writeln!(tx, "\t  rgb: r:{}, g:{}, b:{}", rgb.r, rgb.g, rgb.b)?;
            }
            ["save"] => {
                writeln!(tx, "save state")?;
                self.animator
                    .save_state(&mut self.store)
                    .map_err(CommandError::Storage)?;
            }
            ["option", option] => {
                let option = AnimationOptions::from_bits_truncate(number(option)?);
                if !self.animator.supported_options().contains(option) {
                    return Err(CommandError::Arguments);
                }
                self.animator.set_option(option);
                writeln!(tx, "option: {}", self.animator.option().bits())?;
            }
            [delay] => {
                let delay = number::<u16>(delay)?;
                writeln!(tx, "delay: {}", delay)?;
                self.animator.set_speed(delay);
            }
            [id, run] => {
                let kind = AnimationKind::from_u8(number(id)?).ok_or(CommandError::Arguments)?;
                let run = flag(run)?;

                self.animator.set_animation(kind, &mut self.matrix)?;
                if run {
                    self.animator.start(&mut self.matrix, self.now)?;
                }
                info!("console: animation {}", kind.name());
                writeln!(
                    tx,
                    "animation: set:{}, running:{}",
                    kind.to_u8(),
                    self.animator.is_running() as u8
                )?;
            }
            [pos, h, s, v] => {
                let (pos, color) = (number::<u8>(pos)?, hsv(h, s, v)?);
                let settings = self.animator.settings_mut();
                if pos == 0 {
                    settings.hsv = color;
                } else {
                    settings.hsv2 = color;
                }
            }
            _ => return Err(CommandError::Arguments),
        }

        Ok(())
    }

    fn led_map<W: Write>(&mut self, tx: &mut W) -> CommandResult<IE, S::Error> {
        write!(tx, "[")?;
        for row in 0..MATRIX_ROWS {
            write!(tx, "[")?;
            for col in 0..MATRIX_COLS {
                match led_map::led_position(row, col) {
                    Some(position) => write!(
                        tx,
                        "{{kr:{}, kc:{}, d:{}, r:{}, c:{}}},",
                        row,
                        col,
                        position.device.to_wire(),
                        position.row,
                        position.col
                    )?,
                    None => write!(tx, "{{kr:{}, kc:{}, d:255, r:255, c:255}},", row, col)?,
                }
            }
            write!(tx, "],")?;
        }
        writeln!(tx, "]")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backlight::tests::{backlight, feed},
        matrix::tests::{enable_pushes, pwm_pushes},
        sector::SECTOR_ALPHA,
        store::SectorRecord,
    };

    #[test]
    fn test_parse_line() {
        let (name, args) = parse_line(b"rgb  1 2 3\r").unwrap();
        assert_eq!(name, "rgb");
        assert_eq!(args.as_slice(), &["1", "2", "3"]);

        assert_eq!(parse_line(b"   "), Err(ParseError::Empty));
        assert_eq!(parse_line(&[0xff, 0xfe]), Err(ParseError::NotUtf8));
        assert_eq!(
            parse_line(b"a 1 2 3 4 5 6 7 8 9 0 1"),
            Err(ParseError::TooManyArguments)
        );
        assert!(parse_line(b"a 1 2 3 4 5 6 7 8 9 0").is_ok());
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(lookup("h").map(|info| info.command), Some(UserCommand::Help));
        assert_eq!(lookup("?").map(|info| info.command), Some(UserCommand::Help));
        assert!(lookup("Help").is_none());
        assert!(lookup("sec").is_none());
    }

    #[test]
    fn test_unknown_command() {
        let (mut backlight, _, _) = backlight();
        let reply = feed(&mut backlight, b"!reboot\n");
        assert_eq!(reply.text(), "unknown command: reboot\n");
    }

    /// Rejects every write.
    struct ClosedPort;

    impl embedded_io::ErrorType for ClosedPort {
        type Error = embedded_io::ErrorKind;
    }

    impl Write for ClosedPort {
        fn write(&mut self, _buf: &[u8]) -> Result<usize, Self::Error> {
            Err(embedded_io::ErrorKind::BrokenPipe)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_reply_write_error_is_returned() {
        let (mut backlight, upper, _) = backlight();

        let lines: [&[u8]; 4] = [b"help", b"reboot", b"a 1 2 3 4 5 6 7 8 9 0 1", b"pwm 1 0 0 9"];
        for line in lines {
            assert!(matches!(
                backlight.run_console_line(line, &mut ClosedPort),
                Err(CommandError::Output)
            ));
        }
        // the command stops at its first reply
        assert_eq!(pwm_pushes(&upper), 0);

        backlight.process_byte(b'!', &mut ClosedPort);
        for &byte in b"info\n" {
            backlight.process_byte(byte, &mut ClosedPort);
        }
        let reply = feed(&mut backlight, b"!pwm 1 0 0 9\n");
        assert!(reply.text().ends_with("OK\n"));
        assert_eq!(pwm_pushes(&upper), 1);
    }

    #[test]
    fn test_led_pushes_one_chip() {
        let (mut backlight, upper, lower) = backlight();

        let reply = feed(&mut backlight, b"!led 0 3 2 1\n");

        assert!(reply.text().starts_with("exec: led\n"));
        assert!(reply.text().ends_with("OK\n"));
        let buffer = backlight.matrix().device(Device::Lower).device().buffer();
        assert!(buffer.is_led_enabled(3, 2));
        assert_eq!(enable_pushes(&lower), 1);
        assert!(upper.borrow().is_empty());
    }

    #[test]
    fn test_led_arguments() {
        let (mut backlight, upper, lower) = backlight();

        let lines: [&[u8]; 4] = [
            b"!led 0 3 2\n",
            b"!led 0 16 2 1\n",
            b"!led 0 3 12 1\n",
            b"!led 0 x 2 1\n",
        ];
        for line in lines {
            let reply = feed(&mut backlight, line);
            assert!(reply.text().ends_with("cmd failed!\n"));
        }
        assert!(upper.borrow().is_empty() && lower.borrow().is_empty());
    }

    #[test]
    fn test_pwm_rejects_overflowing_value() {
        let (mut backlight, _, lower) = backlight();

        let reply = feed(&mut backlight, b"!pwm 0 1 1 256\n");
        assert!(reply.text().ends_with("cmd failed!\n"));

        let reply = feed(&mut backlight, b"!pwm 0 1 1 255\n");
        assert!(reply.text().ends_with("OK\n"));
        let buffer = backlight.matrix().device(Device::Lower).device().buffer();
        assert_eq!(buffer.get_pwm(1, 1), 255);
        assert_eq!(pwm_pushes(&lower), 1);
    }

    #[test]
    fn test_rgb_and_hsv() {
        let (mut backlight, upper, _) = backlight();

        feed(&mut backlight, b"!rgb 1 0 3 10 20 30\n");
        assert_eq!(
            backlight.matrix().device(Device::Upper).pixel_rgb(0, 3),
            Some(RGB8::new(10, 20, 30))
        );

        feed(&mut backlight, b"!hsv 1 0 6 0 255 255\n");
        assert_eq!(
            backlight.matrix().device(Device::Upper).pixel_rgb(0, 6),
            Some(Hsv::new(0, 255, 255).to_rgb())
        );
        assert_eq!(pwm_pushes(&upper), 2);
    }

    #[test]
    fn test_sector_save_and_map() {
        let (mut backlight, _, _) = backlight();

        feed(&mut backlight, b"!sector 2 0\n");
        let reply = feed(&mut backlight, b"!sector save\n");
        assert!(reply.text().ends_with("OK\n"));
        let stored = backlight.store_mut().read_sectors().unwrap();
        assert_eq!(stored.enabled & (1 << SECTOR_ALPHA), 0);

        let reply = feed(&mut backlight, b"!sector 2 1 1 2\n");
        assert!(reply.text().ends_with("cmd failed!\n"));

        let reply = feed(&mut backlight, b"!sector 9 1\n");
        assert!(reply.text().ends_with("cmd failed!\n"));
    }

    #[test]
    fn test_sector_listing() {
        let (mut backlight, _, _) = backlight();
        let reply = feed(&mut backlight, b"!sector\n");
        assert!(reply.text().contains("sector 7: enabled:1, h:0, s:0, v:255"));
    }

    #[test]
    fn test_animation_settings() {
        let (mut backlight, _, _) = backlight();

        feed(&mut backlight, b"!animation 100\n");
        assert_eq!(backlight.animator().settings().delay.ticks(), 100);

        feed(&mut backlight, b"!animation 1 10 20 30\n");
        assert_eq!(backlight.animator().settings().hsv2, Hsv::new(10, 20, 30));

        feed(&mut backlight, b"!animation option 2\n");
        assert_eq!(backlight.animator().option(), AnimationOptions::VARIANT_2);

        let reply = feed(&mut backlight, b"!animation 9 1\n");
        assert!(reply.text().ends_with("cmd failed!\n"));
        assert!(!backlight.animator().is_running());
    }

    #[test]
    fn test_animation_save() {
        let (mut backlight, _, _) = backlight();

        feed(&mut backlight, b"!animation 3 0\n");
        feed(&mut backlight, b"!animation save\n");

        let record = backlight.store_mut().read_animation().unwrap();
        assert_eq!(record.kind, AnimationKind::TypeORaindrops.to_u8());
        assert_eq!(record.delay_ms, 20);
    }

    #[test]
    fn test_issi_gcc_and_scan() {
        let (mut backlight, upper, _) = backlight();
        backlight
            .matrix_mut()
            .device_mut(Device::Upper)
            .device_mut()
            .buffer_mut()
            .set_pwm(2, 2, 0x80);
        let before = backlight.matrix().snapshot();

        feed(&mut backlight, b"!issi gcc 1 64\n");
        assert_eq!(backlight.matrix().device(Device::Upper).device().gcc(), 64);

        let reply = feed(&mut backlight, b"!issi open 1\n");
        assert!(reply.text().contains("open leds: 0"));
        assert!(reply.text().ends_with("OK\n"));
        assert_eq!(backlight.matrix().snapshot(), before);
        // one push for the scan, one for the restore
        assert_eq!(pwm_pushes(&upper), 2);

        let reply = feed(&mut backlight, b"!issi blink 1\n");
        assert!(reply.text().ends_with("cmd failed!\n"));
    }

    #[test]
    fn test_bleeprom_resets_store() {
        let (mut backlight, _, _) = backlight();

        feed(&mut backlight, b"!sector 2 0\n");
        feed(&mut backlight, b"!sector save\n");
        let reply = feed(&mut backlight, b"!bleeprom\n");

        assert!(reply.text().ends_with("OK\n"));
        assert_eq!(
            backlight.store_mut().read_sectors().unwrap(),
            SectorRecord::default()
        );
        assert!(backlight.sectors().is_enabled(SECTOR_ALPHA));
    }

    #[test]
    fn test_help_lists_commands() {
        let (mut backlight, _, _) = backlight();
        let reply = feed(&mut backlight, b"!help\n").text();

        for info in COMMANDS {
            assert!(reply.contains(info.name));
        }
    }

    #[test]
    fn test_led_map_dump() {
        let (mut backlight, _, _) = backlight();
        let reply = feed(&mut backlight, b"!ledmap\n").text();

        assert!(reply.contains("[[{kr:0, kc:0, d:1, r:0, c:0},"));
        assert!(reply.contains("{kr:0, kc:1, d:255, r:255, c:255},"));
        assert!(reply.ends_with("]\nOK\n"));
    }

    #[test]
    fn test_info() {
        let (mut backlight, _, _) = backlight();
        let reply = feed(&mut backlight, b"!info\n").text();

        assert!(reply.contains(env!("CARGO_PKG_NAME")));
        assert!(reply.contains("upper: gcc:128, master:1"));
    }
}
