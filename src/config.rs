use std::path::PathBuf;

use crate::{
    classifier::{
        AngleRange, Axis, DEFAULT_ANGLE_THRESHOLD_DEG, DEFAULT_DISTANCE_THRESHOLD_PX, Strategy,
    },
    error::ConfigError,
    model_download::ModelKind,
    pipeline::{ReadErrorPolicy, RunOptions, handpose::DEFAULT_MIN_CONFIDENCE},
    roi::{DEFAULT_CENTERED_FRACTION, RegionOfInterest, RegionSpec},
    serial::DEFAULT_BAUD_RATE,
};

pub const USAGE: &str = "\
usage: finger-relay [options]

input:
  --camera <index>             webcam to read from (default 0)
  --image <path>               read a still image instead; repeatable
  --mirror                     flip frames horizontally before detection

classification:
  --strategy <name>            coordinate | angle | distance (default coordinate)
  --thumb-axis <x|y>           axis for the coordinate thumb test (default x)
  --angle-threshold <deg>      bent below this joint angle (default 160)
  --angle-range <full|folded>  reported angle range (default full)
  --distance-threshold <px>    closed below this knuckle-tip distance (default 20)
  --min-confidence <f>         minimum hand confidence (default 0.5)

region of interest:
  --roi <x,y,w,h>              fixed region in pixels
  --roi-centered [fraction]    centered region (default fraction 0.4)

output:
  --serial <device>            send bitmask lines to this serial device
  --baud <rate>                serial baud rate (default 9600)
  --save-dir <dir>             write annotated frames as PNG files

run:
  --on-read-error <skip|abort> frame read failure handling (default skip)
  --max-frames <n>             stop after n frames
  --model <path>               handpose estimator ONNX model path
  --palm-model <path>          palm detector ONNX model path
  -h, --help                   show this help
";

#[derive(Clone, Debug, PartialEq)]
pub enum InputSource {
    Camera(u32),
    Images(Vec<PathBuf>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub input: InputSource,
    pub mirror: bool,
    pub strategy: Strategy,
    pub min_confidence: f32,
    pub region: RegionSpec,
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    pub save_dir: Option<PathBuf>,
    pub run: RunOptions,
    pub model_path: PathBuf,
    pub palm_model_path: PathBuf,
    pub show_help: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputSource::Camera(0),
            mirror: false,
            strategy: Strategy::default(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            region: RegionSpec::Disabled,
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            save_dir: None,
            run: RunOptions::default(),
            model_path: ModelKind::HandposeEstimator.default_path(),
            palm_model_path: ModelKind::PalmDetector.default_path(),
            show_help: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StrategyName {
    Coordinate,
    Angle,
    Distance,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(std::env::args().skip(1))
    }

    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cfg = Config::default();
        let mut args = args.into_iter().map(Into::into).peekable();

        let mut camera: Option<u32> = None;
        let mut images: Vec<PathBuf> = Vec::new();
        let mut strategy_name = StrategyName::Coordinate;
        let mut thumb_axis = Axis::X;
        let mut angle_threshold = DEFAULT_ANGLE_THRESHOLD_DEG;
        let mut angle_range = AngleRange::Full;
        let mut distance_threshold = DEFAULT_DISTANCE_THRESHOLD_PX;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => cfg.show_help = true,
                "--camera" => {
                    camera = Some(parse("--camera", next_value(&mut args, "--camera")?)?);
                }
                "--image" => images.push(PathBuf::from(next_value(&mut args, "--image")?)),
                "--mirror" => cfg.mirror = true,
                "--strategy" => {
                    let value = next_value(&mut args, "--strategy")?;
                    strategy_name = match value.as_str() {
                        "coordinate" => StrategyName::Coordinate,
                        "angle" => StrategyName::Angle,
                        "distance" => StrategyName::Distance,
                        _ => {
                            return Err(invalid(
                                "--strategy",
                                value,
                                "expected coordinate, angle or distance",
                            ));
                        }
                    };
                }
                "--thumb-axis" => {
                    let value = next_value(&mut args, "--thumb-axis")?;
                    thumb_axis = match value.as_str() {
                        "x" => Axis::X,
                        "y" => Axis::Y,
                        _ => return Err(invalid("--thumb-axis", value, "expected x or y")),
                    };
                }
                "--angle-threshold" => {
                    angle_threshold = parse_positive(
                        "--angle-threshold",
                        next_value(&mut args, "--angle-threshold")?,
                    )?;
                }
                "--angle-range" => {
                    let value = next_value(&mut args, "--angle-range")?;
                    angle_range = match value.as_str() {
                        "full" => AngleRange::Full,
                        "folded" => AngleRange::Folded,
                        _ => return Err(invalid("--angle-range", value, "expected full or folded")),
                    };
                }
                "--distance-threshold" => {
                    distance_threshold = parse_positive(
                        "--distance-threshold",
                        next_value(&mut args, "--distance-threshold")?,
                    )?;
                }
                "--min-confidence" => {
                    let value = next_value(&mut args, "--min-confidence")?;
                    let parsed: f32 = parse("--min-confidence", value.clone())?;
                    if !(0.0..=1.0).contains(&parsed) {
                        return Err(invalid(
                            "--min-confidence",
                            value,
                            "expected a value in [0, 1]",
                        ));
                    }
                    cfg.min_confidence = parsed;
                }
                "--roi" => {
                    cfg.region = RegionSpec::Fixed(parse_roi(next_value(&mut args, "--roi")?)?);
                }
                "--roi-centered" => {
                    let has_value = args.peek().is_some_and(|next| !next.starts_with("--"));
                    let fraction = match args.next_if(|_| has_value) {
                        Some(value) => {
                            let parsed: f32 = parse("--roi-centered", value.clone())?;
                            if !(parsed > 0.0 && parsed <= 1.0) {
                                return Err(invalid(
                                    "--roi-centered",
                                    value,
                                    "expected a fraction in (0, 1]",
                                ));
                            }
                            parsed
                        }
                        None => DEFAULT_CENTERED_FRACTION,
                    };
                    cfg.region = RegionSpec::Centered(fraction);
                }
                "--serial" => cfg.serial_port = Some(next_value(&mut args, "--serial")?),
                "--baud" => cfg.baud_rate = parse("--baud", next_value(&mut args, "--baud")?)?,
                "--save-dir" => {
                    cfg.save_dir = Some(PathBuf::from(next_value(&mut args, "--save-dir")?));
                }
                "--on-read-error" => {
                    let value = next_value(&mut args, "--on-read-error")?;
                    cfg.run.on_read_error = match value.as_str() {
                        "skip" => ReadErrorPolicy::Skip,
                        "abort" => ReadErrorPolicy::Abort,
                        _ => return Err(invalid("--on-read-error", value, "expected skip or abort")),
                    };
                }
                "--max-frames" => {
                    let value = next_value(&mut args, "--max-frames")?;
                    cfg.run.max_frames = Some(parse("--max-frames", value)?);
                }
                "--model" => cfg.model_path = PathBuf::from(next_value(&mut args, "--model")?),
                "--palm-model" => {
                    cfg.palm_model_path = PathBuf::from(next_value(&mut args, "--palm-model")?);
                }
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        cfg.input = match (camera, images.is_empty()) {
            (Some(_), false) => return Err(ConfigError::ConflictingSources),
            (Some(index), true) => InputSource::Camera(index),
            (None, false) => InputSource::Images(images),
            (None, true) => InputSource::Camera(0),
        };

        cfg.strategy = match strategy_name {
            StrategyName::Coordinate => Strategy::Coordinate { thumb_axis },
            StrategyName::Angle => Strategy::Angle {
                threshold_deg: angle_threshold,
                range: angle_range,
            },
            StrategyName::Distance => Strategy::Distance {
                threshold_px: distance_threshold,
            },
        };

        Ok(cfg)
    }
}

fn next_value<I: Iterator<Item = String>>(
    args: &mut I,
    flag: &'static str,
) -> Result<String, ConfigError> {
    args.next().ok_or(ConfigError::MissingValue(flag))
}

fn invalid(flag: &'static str, value: String, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        flag,
        value,
        reason: reason.to_string(),
    }
}

fn parse<T>(flag: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|err| {
        let reason = err.to_string();
        invalid(flag, value, &reason)
    })
}

fn parse_positive(flag: &'static str, value: String) -> Result<f32, ConfigError> {
    let parsed: f32 = parse(flag, value.clone())?;
    if parsed.is_finite() && parsed > 0.0 {
        Ok(parsed)
    } else {
        Err(invalid(flag, value, "expected a positive number"))
    }
}

fn parse_roi(value: String) -> Result<RegionOfInterest, ConfigError> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(invalid("--roi", value, "expected x,y,w,h"));
    }
    let mut nums = [0i32; 4];
    for (slot, part) in nums.iter_mut().zip(&parts) {
        *slot = match part.parse() {
            Ok(n) => n,
            Err(_) => return Err(invalid("--roi", value, "expected integers")),
        };
    }
    let [x, y, w, h] = nums;
    if w <= 0 || h <= 0 {
        return Err(invalid("--roi", value, "width and height must be positive"));
    }
    if x.checked_add(w).is_none() || y.checked_add(h).is_none() {
        return Err(invalid("--roi", value, "region extends past the coordinate range"));
    }
    Ok(RegionOfInterest::new(x, y, w, h))
}
