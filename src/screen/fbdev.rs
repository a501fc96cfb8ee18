//! Legacy Linux framebuffer backend.
//!
//! The fbdev interface reports its pixel layout as four bit fields in
//! `fb_var_screeninfo`; any mode with distinguishable RGB channels is usable
//! as-is. Grayscale, FOURCC and indexed modes get one corrective attempt to
//! switch into a 32-bit RGB layout before the backend gives up.

use std::ffi::CStr;
use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

use tracing::warn;

use super::map::{page_align, Mapping};
use super::{open_device, Screen};
use crate::error::{YavError, YavResult};
use crate::format::{Channel, PixelFormat};
use crate::geometry::Viewport;

const FALLBACK_PATHS: &[&str] = &["/dev/fb0", "/dev/fb/0"];

const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;
const FBIOPUT_VSCREENINFO: libc::c_ulong = 0x4601;
const FBIOGET_FSCREENINFO: libc::c_ulong = 0x4602;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct FbVarScreeninfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: FbBitfield,
    green: FbBitfield,
    blue: FbBitfield,
    transp: FbBitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct FbFixScreeninfo {
    id: [u8; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    r#type: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: libc::c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

fn fb_ioctl<T>(file: &File, request: libc::c_ulong, arg: &mut T, op: &'static str) -> YavResult<()> {
    // SAFETY: `arg` is a properly laid out, writable struct for `request`
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request, arg as *mut T) };
    if rc != 0 {
        return Err(YavError::hardware(op, io::Error::last_os_error()));
    }
    Ok(())
}

fn load_info(file: &File) -> YavResult<(FbVarScreeninfo, FbFixScreeninfo)> {
    let mut var = FbVarScreeninfo::default();
    let mut fix = FbFixScreeninfo::default();
    fb_ioctl(file, FBIOGET_VSCREENINFO, &mut var, "FBIOGET_VSCREENINFO")?;
    fb_ioctl(file, FBIOGET_FSCREENINFO, &mut fix, "FBIOGET_FSCREENINFO")?;
    Ok((var, fix))
}

fn format_of(var: &FbVarScreeninfo) -> PixelFormat {
    let channel = |bf: FbBitfield| Channel::new(bf.length, bf.offset);
    PixelFormat::new(
        var.bits_per_pixel,
        channel(var.red),
        channel(var.green),
        channel(var.blue),
        channel(var.transp),
    )
}

/// grayscale values above 1 denote FOURCC modes, which use packed encodings
/// this backend cannot interpret
fn has_color(var: &FbVarScreeninfo) -> bool {
    var.grayscale == 0 && format_of(var).color()
}

/// A memory-mapped legacy framebuffer device.
///
/// Teardown is the reverse of acquisition: the mapping is dropped first,
/// then the device handle closes.
pub struct FramebufferScreen {
    map: Mapping,
    var: FbVarScreeninfo,
    fix: FbFixScreeninfo,
    viewport: Option<Viewport>,
    file: File,
}

impl FramebufferScreen {
    /// Open `path` or, failing that, the well-known framebuffer nodes.
    pub fn open(path: Option<&str>) -> YavResult<Self> {
        let file = open_device(path, FALLBACK_PATHS, "framebuffer")?;
        let (mut var, mut fix) = load_info(&file)?;

        if !has_color(&var) {
            warn!("framebuffer has no usable color format, trying to switch to 32-bit RGB");

            var.bits_per_pixel = 32;
            var.grayscale = 0;
            var.red = FbBitfield { offset: 0, length: 8, msb_right: 0 };
            var.green = FbBitfield { offset: 8, length: 8, msb_right: 0 };
            var.blue = FbBitfield { offset: 16, length: 8, msb_right: 0 };
            var.transp = FbBitfield::default();

            fb_ioctl(&file, FBIOPUT_VSCREENINFO, &mut var, "FBIOPUT_VSCREENINFO")?;
            (var, fix) = load_info(&file)?;

            if !has_color(&var) {
                return Err(YavError::format(
                    "framebuffer cannot present recognizable color",
                ));
            }
        }

        let map = Mapping::new(&file, page_align(fix.smem_len as usize), 0)?;

        Ok(Self {
            map,
            var,
            fix,
            viewport: None,
            file,
        })
    }

    fn name(&self) -> String {
        CStr::from_bytes_until_nul(&self.fix.id)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&self.fix.id).into_owned())
    }
}

impl Screen for FramebufferScreen {
    fn width(&self) -> u32 {
        self.var.xres
    }

    fn height(&self) -> u32 {
        self.var.yres
    }

    fn format(&self) -> PixelFormat {
        // re-derive on every query; the cached info is only replaced
        // wholesale after a successful reload
        if let Ok((var, _)) = load_info(&self.file) {
            return format_of(&var);
        }
        format_of(&self.var)
    }

    fn data(&mut self) -> &mut [u8] {
        self.map.as_mut_slice()
    }

    fn present(&mut self) -> YavResult<()> {
        // a legacy framebuffer is the visible surface, writes land directly
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn describe(&self) -> String {
        format!(
            "framebuffer '{}' ({}x{}) {} format: {}",
            self.name(),
            self.width(),
            self.height(),
            if has_color(&self.var) { "color" } else { "grayscale" },
            self.format().describe(),
        )
    }
}
