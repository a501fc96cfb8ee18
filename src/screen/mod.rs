//! Display surfaces.
//!
//! Two physically different acquisition paths, the legacy linear
//! framebuffer and a mode-setting display controller, sit behind one
//! [`Screen`] contract. A backend owns its OS handles exclusively and
//! releases them in reverse-acquisition order when dropped.

pub mod drm;
pub mod fbdev;
mod map;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{YavError, YavResult};
use crate::format::PixelFormat;
use crate::geometry::Viewport;

/// A writable display surface.
///
/// The raw buffer holds packed little-endian pixel words laid out row-major
/// at `width()` pixels per row; `format()` describes the word layout and is
/// re-derived from device state on every call.
pub trait Screen {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Layout of a single pixel word.
    fn format(&self) -> PixelFormat;

    /// The mapped pixel memory.
    fn data(&mut self) -> &mut [u8];

    /// Publish written pixel memory to the physical display.
    fn present(&mut self) -> YavResult<()>;

    /// Restrict drawing to a sub-region of the surface.
    fn set_viewport(&mut self, viewport: Option<Viewport>);

    /// The active placement canvas, if one was set.
    fn viewport(&self) -> Option<Viewport>;

    /// One-line backend/format overview for diagnostics.
    fn describe(&self) -> String;
}

/// Which backend a descriptor selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    Fbdev,
    Drm,
}

/// Parsed `--dev` descriptor: `fb[:path]` or `drm[:[path]][@connector]`.
///
/// A path of `?` requests backend-specific help instead of opening anything.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSpec {
    pub kind: DeviceKind,
    pub path: Option<String>,
    pub connector: Option<u32>,
}

impl Default for DeviceSpec {
    fn default() -> Self {
        Self {
            kind: DeviceKind::Fbdev,
            path: None,
            connector: None,
        }
    }
}

impl DeviceSpec {
    /// Whether the descriptor asked for backend help (`fb:?` / `drm:?`).
    pub fn wants_help(&self) -> bool {
        self.path.as_deref() == Some("?")
    }

    /// Backend-specific usage text for `:?`.
    pub fn help(&self) -> &'static str {
        match self.kind {
            DeviceKind::Fbdev => {
                "fb[:path]\n\
                 \x20 Legacy Linux framebuffer device. Without a path the\n\
                 \x20 well-known nodes /dev/fb0 and /dev/fb/0 are tried in order."
            }
            DeviceKind::Drm => {
                "drm[:[path]][@connector]\n\
                 \x20 Mode-setting (KMS) device. Without a path /dev/dri/card0\n\
                 \x20 is used. '@connector' pins a specific connector id instead\n\
                 \x20 of the first connected one."
            }
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = YavError;

    fn from_str(descriptor: &str) -> YavResult<Self> {
        let (device, rest) = match descriptor.split_once(':') {
            Some((device, rest)) => (device, Some(rest)),
            None => (descriptor, None),
        };

        match device {
            "fb" => Ok(DeviceSpec {
                kind: DeviceKind::Fbdev,
                path: rest.filter(|p| !p.is_empty()).map(str::to_owned),
                connector: None,
            }),
            "drm" => {
                // the connector tag may follow the path or stand alone
                let (path, connector) = match rest {
                    Some(rest) => match rest.rsplit_once('@') {
                        Some((path, conn)) => (path, Some(conn)),
                        None => (rest, None),
                    },
                    None => ("", None),
                };

                let connector = connector
                    .map(|c| {
                        c.parse::<u32>().map_err(|_| {
                            YavError::input(format!("invalid connector id '{c}'"))
                        })
                    })
                    .transpose()?;

                Ok(DeviceSpec {
                    kind: DeviceKind::Drm,
                    path: (!path.is_empty()).then(|| path.to_owned()),
                    connector,
                })
            }
            other => {
                // `drm@7` has no colon, so the kind still carries the tag
                if let Some((kind, conn)) = other.split_once('@') {
                    if kind == "drm" {
                        return format!("drm:@{conn}").parse();
                    }
                }

                Err(YavError::input(format!(
                    "unknown device '{other}', expected 'fb' or 'drm'"
                )))
            }
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Fbdev => write!(f, "fb")?,
            DeviceKind::Drm => write!(f, "drm")?,
        }
        if let Some(path) = &self.path {
            write!(f, ":{path}")?;
        }
        if let Some(conn) = self.connector {
            write!(f, "@{conn}")?;
        }
        Ok(())
    }
}

/// Open a device node, falling back through well-known paths.
///
/// Each unusable candidate only warns; the error is fatal when every
/// candidate is exhausted.
pub(crate) fn open_device(
    custom: Option<&str>,
    fallbacks: &[&str],
    kind: &'static str,
) -> YavResult<File> {
    for path in custom.into_iter().chain(fallbacks.iter().copied()) {
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => {
                debug!(path, "opened {kind} device");
                return Ok(file);
            }
            Err(err) => warn!("failed to open {kind} device '{path}': {err}"),
        }
    }

    Err(YavError::NoDevice(kind))
}

/// Open the display surface a descriptor selects.
pub fn open(spec: &DeviceSpec) -> YavResult<Box<dyn Screen>> {
    match spec.kind {
        DeviceKind::Fbdev => Ok(Box::new(fbdev::FramebufferScreen::open(
            spec.path.as_deref(),
        )?)),
        DeviceKind::Drm => Ok(Box::new(drm::DrmScreen::open(
            spec.path.as_deref(),
            spec.connector,
        )?)),
    }
}
