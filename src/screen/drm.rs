//! Mode-setting (KMS) backend.
//!
//! Talks straight to the DRM mode-setting ioctls: enumerate connectors,
//! pick a mode, resolve the CRTC behind the connector's encoder, allocate a
//! CPU-mappable dumb buffer and publish it on present. Single-buffered:
//! each present re-publishes the same mapping, so tearing under partial
//! writes is accepted.

use std::fs::File;
use std::io;
use std::mem;
use std::os::unix::io::AsRawFd;

use tracing::debug;

use super::map::Mapping;
use super::{open_device, Screen};
use crate::error::{YavError, YavResult};
use crate::format::{Channel, PixelFormat};
use crate::geometry::Viewport;

const FALLBACK_PATHS: &[&str] = &["/dev/dri/card0"];

// request codes match the kernel's _IO/_IOWR('d', nr, type) encoding
const fn drm_io(nr: libc::c_ulong) -> libc::c_ulong {
    (0x64 << 8) | nr
}

const fn drm_iowr<T>(nr: libc::c_ulong) -> libc::c_ulong {
    0xC000_0000 | ((mem::size_of::<T>() as libc::c_ulong) << 16) | (0x64 << 8) | nr
}

const DRM_IOCTL_SET_MASTER: libc::c_ulong = drm_io(0x1e);
const DRM_IOCTL_DROP_MASTER: libc::c_ulong = drm_io(0x1f);
const DRM_IOCTL_MODE_GETRESOURCES: libc::c_ulong = drm_iowr::<DrmModeCardRes>(0xa0);
const DRM_IOCTL_MODE_GETCRTC: libc::c_ulong = drm_iowr::<DrmModeCrtc>(0xa1);
const DRM_IOCTL_MODE_SETCRTC: libc::c_ulong = drm_iowr::<DrmModeCrtc>(0xa2);
const DRM_IOCTL_MODE_GETENCODER: libc::c_ulong = drm_iowr::<DrmModeGetEncoder>(0xa6);
const DRM_IOCTL_MODE_GETCONNECTOR: libc::c_ulong = drm_iowr::<DrmModeGetConnector>(0xa7);
const DRM_IOCTL_MODE_ADDFB: libc::c_ulong = drm_iowr::<DrmModeFbCmd>(0xae);
const DRM_IOCTL_MODE_RMFB: libc::c_ulong = drm_iowr::<libc::c_uint>(0xaf);
const DRM_IOCTL_MODE_CREATE_DUMB: libc::c_ulong = drm_iowr::<DrmModeCreateDumb>(0xb2);
const DRM_IOCTL_MODE_MAP_DUMB: libc::c_ulong = drm_iowr::<DrmModeMapDumb>(0xb3);
const DRM_IOCTL_MODE_DESTROY_DUMB: libc::c_ulong = drm_iowr::<DrmModeDestroyDumb>(0xb4);

const DRM_MODE_CONNECTED: u32 = 1;
const DRM_MODE_TYPE_PREFERRED: u32 = 1 << 3;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeInfo {
    clock: u32,
    hdisplay: u16,
    hsync_start: u16,
    hsync_end: u16,
    htotal: u16,
    hskew: u16,
    vdisplay: u16,
    vsync_start: u16,
    vsync_end: u16,
    vtotal: u16,
    vscan: u16,
    vrefresh: u32,
    flags: u32,
    r#type: u32,
    name: [u8; 32],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeCardRes {
    fb_id_ptr: u64,
    crtc_id_ptr: u64,
    connector_id_ptr: u64,
    encoder_id_ptr: u64,
    count_fbs: u32,
    count_crtcs: u32,
    count_connectors: u32,
    count_encoders: u32,
    min_width: u32,
    max_width: u32,
    min_height: u32,
    max_height: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeGetConnector {
    encoders_ptr: u64,
    modes_ptr: u64,
    props_ptr: u64,
    prop_values_ptr: u64,
    count_modes: u32,
    count_props: u32,
    count_encoders: u32,
    encoder_id: u32,
    connector_id: u32,
    connector_type: u32,
    connector_type_id: u32,
    connection: u32,
    mm_width: u32,
    mm_height: u32,
    subpixel: u32,
    pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeGetEncoder {
    encoder_id: u32,
    encoder_type: u32,
    crtc_id: u32,
    possible_crtcs: u32,
    possible_clones: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeCrtc {
    set_connectors_ptr: u64,
    count_connectors: u32,
    crtc_id: u32,
    fb_id: u32,
    x: u32,
    y: u32,
    gamma_size: u32,
    mode_valid: u32,
    mode: DrmModeInfo,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeCreateDumb {
    height: u32,
    width: u32,
    bpp: u32,
    flags: u32,
    handle: u32,
    pitch: u32,
    size: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeMapDumb {
    handle: u32,
    pad: u32,
    offset: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeDestroyDumb {
    handle: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DrmModeFbCmd {
    fb_id: u32,
    width: u32,
    height: u32,
    pitch: u32,
    bpp: u32,
    depth: u32,
    handle: u32,
}

fn drm_ioctl<T>(file: &File, request: libc::c_ulong, arg: &mut T, op: &'static str) -> YavResult<()> {
    // SAFETY: `arg` is a properly laid out struct for `request`; any array
    // pointers inside it point at live allocations sized by their counts
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request, arg as *mut T) };
    if rc != 0 {
        return Err(YavError::hardware(op, io::Error::last_os_error()));
    }
    Ok(())
}

fn drm_ioctl_bare(file: &File, request: libc::c_ulong, op: &'static str) -> YavResult<()> {
    // SAFETY: the request takes no argument
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request) };
    if rc != 0 {
        return Err(YavError::hardware(op, io::Error::last_os_error()));
    }
    Ok(())
}

/// Connector ids advertised by the device, via the usual count-then-fill
/// double call.
fn connector_ids(file: &File) -> YavResult<Vec<u32>> {
    let mut res = DrmModeCardRes::default();
    drm_ioctl(file, DRM_IOCTL_MODE_GETRESOURCES, &mut res, "DRM_IOCTL_MODE_GETRESOURCES")?;

    let mut fbs = vec![0u32; res.count_fbs as usize];
    let mut crtcs = vec![0u32; res.count_crtcs as usize];
    let mut connectors = vec![0u32; res.count_connectors as usize];
    let mut encoders = vec![0u32; res.count_encoders as usize];

    let mut filled = DrmModeCardRes {
        fb_id_ptr: fbs.as_mut_ptr() as u64,
        crtc_id_ptr: crtcs.as_mut_ptr() as u64,
        connector_id_ptr: connectors.as_mut_ptr() as u64,
        encoder_id_ptr: encoders.as_mut_ptr() as u64,
        count_fbs: fbs.len() as u32,
        count_crtcs: crtcs.len() as u32,
        count_connectors: connectors.len() as u32,
        count_encoders: encoders.len() as u32,
        ..DrmModeCardRes::default()
    };
    drm_ioctl(file, DRM_IOCTL_MODE_GETRESOURCES, &mut filled, "DRM_IOCTL_MODE_GETRESOURCES")?;

    connectors.truncate((filled.count_connectors as usize).min(connectors.len()));
    Ok(connectors)
}

struct ConnectorInfo {
    id: u32,
    encoder_id: u32,
    connector_type_id: u32,
    connection: u32,
    modes: Vec<DrmModeInfo>,
}

impl ConnectorInfo {
    fn usable(&self) -> bool {
        self.connection == DRM_MODE_CONNECTED && !self.modes.is_empty()
    }
}

fn fetch_connector(file: &File, id: u32) -> YavResult<ConnectorInfo> {
    let mut probe = DrmModeGetConnector {
        connector_id: id,
        ..DrmModeGetConnector::default()
    };
    drm_ioctl(file, DRM_IOCTL_MODE_GETCONNECTOR, &mut probe, "DRM_IOCTL_MODE_GETCONNECTOR")?;

    let mut modes = vec![DrmModeInfo::default(); probe.count_modes as usize];
    let mut props = vec![0u32; probe.count_props as usize];
    let mut prop_values = vec![0u64; probe.count_props as usize];
    let mut encoders = vec![0u32; probe.count_encoders as usize];

    let mut filled = DrmModeGetConnector {
        connector_id: id,
        modes_ptr: modes.as_mut_ptr() as u64,
        count_modes: modes.len() as u32,
        props_ptr: props.as_mut_ptr() as u64,
        prop_values_ptr: prop_values.as_mut_ptr() as u64,
        count_props: props.len() as u32,
        encoders_ptr: encoders.as_mut_ptr() as u64,
        count_encoders: encoders.len() as u32,
        ..DrmModeGetConnector::default()
    };
    drm_ioctl(file, DRM_IOCTL_MODE_GETCONNECTOR, &mut filled, "DRM_IOCTL_MODE_GETCONNECTOR")?;

    modes.truncate((filled.count_modes as usize).min(modes.len()));

    Ok(ConnectorInfo {
        id,
        encoder_id: filled.encoder_id,
        connector_type_id: filled.connector_type_id,
        connection: filled.connection,
        modes,
    })
}

/// First connector that is connected and reports at least one mode, or the
/// one explicitly requested.
fn pick_connector(file: &File, wanted: Option<u32>) -> YavResult<ConnectorInfo> {
    for id in connector_ids(file)? {
        let info = match fetch_connector(file, id) {
            Ok(info) => info,
            Err(err) => {
                debug!("skipping connector {id}: {err}");
                continue;
            }
        };

        match wanted {
            Some(want) if info.id == want => {
                if !info.usable() {
                    return Err(YavError::Display(format!(
                        "connector {want} is disconnected or has no modes"
                    )));
                }
                return Ok(info);
            }
            Some(_) => continue,
            None if info.usable() => return Ok(info),
            None => continue,
        }
    }

    Err(match wanted {
        Some(want) => YavError::Display(format!("connector {want} not found")),
        None => YavError::Display("no connected connector with modes found".into()),
    })
}

/// Driver-preferred mode if flagged, else the one with the most pixels.
fn pick_mode(connector: &ConnectorInfo) -> YavResult<DrmModeInfo> {
    let mut pixels = 0usize;
    let mut selected = None;

    for mode in &connector.modes {
        if mode.r#type & DRM_MODE_TYPE_PREFERRED != 0 {
            return Ok(*mode);
        }

        let size = mode.hdisplay as usize * mode.vdisplay as usize;
        debug!(
            "found mode {}x{}@{}",
            mode.hdisplay, mode.vdisplay, mode.vrefresh
        );

        if size > pixels {
            pixels = size;
            selected = Some(*mode);
        }
    }

    selected.ok_or_else(|| {
        YavError::Display(format!("connector {} has no usable mode", connector.id))
    })
}

/// The CRTC currently bound to the connector, via its active encoder.
fn resolve_crtc(file: &File, connector: &ConnectorInfo) -> YavResult<DrmModeCrtc> {
    if connector.encoder_id == 0 {
        return Err(YavError::Display(format!(
            "connector {} has no active encoder",
            connector.id
        )));
    }

    let mut encoder = DrmModeGetEncoder {
        encoder_id: connector.encoder_id,
        ..DrmModeGetEncoder::default()
    };
    drm_ioctl(file, DRM_IOCTL_MODE_GETENCODER, &mut encoder, "DRM_IOCTL_MODE_GETENCODER")?;

    if encoder.crtc_id == 0 {
        return Err(YavError::Display(format!(
            "encoder {} drives no CRTC",
            connector.encoder_id
        )));
    }

    let mut crtc = DrmModeCrtc {
        crtc_id: encoder.crtc_id,
        ..DrmModeCrtc::default()
    };
    drm_ioctl(file, DRM_IOCTL_MODE_GETCRTC, &mut crtc, "DRM_IOCTL_MODE_GETCRTC")?;

    Ok(crtc)
}

/// A dumb-buffer KMS surface, published to the CRTC on every present.
pub struct DrmScreen {
    map: Mapping,
    dumb: DrmModeCreateDumb,
    fb_id: u32,
    crtc_id: u32,
    saved_crtc: DrmModeCrtc,
    connector_id: u32,
    connector_type_id: u32,
    mode: DrmModeInfo,
    viewport: Option<Viewport>,
    file: File,
}

impl DrmScreen {
    /// Open `path` (or the default card node) and bring up the whole
    /// pipeline: connector, mode, CRTC, dumb buffer, framebuffer object,
    /// mapping.
    pub fn open(path: Option<&str>, connector: Option<u32>) -> YavResult<Self> {
        let file = open_device(path, FALLBACK_PATHS, "drm")?;

        let conn = pick_connector(&file, connector)?;
        let mode = pick_mode(&conn)?;
        let saved_crtc = resolve_crtc(&file, &conn)?;

        // off-screen buffer at a fixed 24-bit depth / 32-bit stride
        let mut dumb = DrmModeCreateDumb {
            width: mode.hdisplay as u32,
            height: mode.vdisplay as u32,
            bpp: 32,
            ..DrmModeCreateDumb::default()
        };
        drm_ioctl(&file, DRM_IOCTL_MODE_CREATE_DUMB, &mut dumb, "DRM_IOCTL_MODE_CREATE_DUMB")?;

        let screen = (|| {
            let mut fb = DrmModeFbCmd {
                width: dumb.width,
                height: dumb.height,
                pitch: dumb.pitch,
                bpp: dumb.bpp,
                depth: 24,
                handle: dumb.handle,
                ..DrmModeFbCmd::default()
            };
            drm_ioctl(&file, DRM_IOCTL_MODE_ADDFB, &mut fb, "DRM_IOCTL_MODE_ADDFB")?;

            let mut map_req = DrmModeMapDumb {
                handle: dumb.handle,
                ..DrmModeMapDumb::default()
            };
            if let Err(err) =
                drm_ioctl(&file, DRM_IOCTL_MODE_MAP_DUMB, &mut map_req, "DRM_IOCTL_MODE_MAP_DUMB")
            {
                remove_framebuffer(&file, fb.fb_id);
                return Err(err);
            }

            let map = match Mapping::new(&file, dumb.size as usize, map_req.offset as i64) {
                Ok(map) => map,
                Err(err) => {
                    remove_framebuffer(&file, fb.fb_id);
                    return Err(err);
                }
            };

            Ok((fb.fb_id, map))
        })();

        let (fb_id, map) = match screen {
            Ok(parts) => parts,
            Err(err) => {
                destroy_dumb(&file, dumb.handle);
                return Err(err);
            }
        };

        Ok(Self {
            map,
            dumb,
            fb_id,
            crtc_id: saved_crtc.crtc_id,
            saved_crtc,
            connector_id: conn.id,
            connector_type_id: conn.connector_type_id,
            mode,
            viewport: None,
            file,
        })
    }

    fn set_crtc(&self, fb_id: u32, mode: DrmModeInfo, mode_valid: u32) -> YavResult<()> {
        let connector_id = self.connector_id;
        let mut crtc = DrmModeCrtc {
            set_connectors_ptr: &connector_id as *const u32 as u64,
            count_connectors: 1,
            crtc_id: self.crtc_id,
            fb_id,
            mode,
            mode_valid,
            ..DrmModeCrtc::default()
        };
        drm_ioctl(&self.file, DRM_IOCTL_MODE_SETCRTC, &mut crtc, "DRM_IOCTL_MODE_SETCRTC")
    }
}

fn remove_framebuffer(file: &File, fb_id: u32) {
    let mut id: libc::c_uint = fb_id;
    let _ = drm_ioctl(file, DRM_IOCTL_MODE_RMFB, &mut id, "DRM_IOCTL_MODE_RMFB");
}

fn destroy_dumb(file: &File, handle: u32) {
    let mut req = DrmModeDestroyDumb { handle };
    let _ = drm_ioctl(file, DRM_IOCTL_MODE_DESTROY_DUMB, &mut req, "DRM_IOCTL_MODE_DESTROY_DUMB");
}

impl Screen for DrmScreen {
    fn width(&self) -> u32 {
        self.dumb.width
    }

    fn height(&self) -> u32 {
        self.dumb.height
    }

    fn format(&self) -> PixelFormat {
        // dumb buffers are created as XRGB8888
        PixelFormat::new(
            32,
            Channel::new(8, 16),
            Channel::new(8, 8),
            Channel::new(8, 0),
            Channel::new(8, 24),
        )
    }

    fn data(&mut self) -> &mut [u8] {
        self.map.as_mut_slice()
    }

    /// Program the CRTC to scan the dumb buffer out, under a briefly held
    /// master lock.
    fn present(&mut self) -> YavResult<()> {
        drm_ioctl_bare(&self.file, DRM_IOCTL_SET_MASTER, "DRM_IOCTL_SET_MASTER")?;
        let result = self.set_crtc(self.fb_id, self.mode, 1);
        let _ = drm_ioctl_bare(&self.file, DRM_IOCTL_DROP_MASTER, "DRM_IOCTL_DROP_MASTER");
        result
    }

    fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn describe(&self) -> String {
        format!(
            "drm conn={} crtc={} type={} ({}x{}) color format: {}",
            self.connector_id,
            self.crtc_id,
            self.connector_type_id,
            self.width(),
            self.height(),
            self.format().describe(),
        )
    }
}

impl Drop for DrmScreen {
    fn drop(&mut self) {
        // strict reverse of acquisition; mode restore is best effort
        if drm_ioctl_bare(&self.file, DRM_IOCTL_SET_MASTER, "DRM_IOCTL_SET_MASTER").is_ok() {
            let _ = self.set_crtc(
                self.saved_crtc.fb_id,
                self.saved_crtc.mode,
                self.saved_crtc.mode_valid,
            );
            let _ = drm_ioctl_bare(&self.file, DRM_IOCTL_DROP_MASTER, "DRM_IOCTL_DROP_MASTER");
        }

        remove_framebuffer(&self.file, self.fb_id);
        destroy_dumb(&self.file, self.dumb.handle);
        // the mapping unmaps and the device handle closes as fields drop
    }
}
