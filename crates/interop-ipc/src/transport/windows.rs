//! Windows named pipe endpoints.
//!
//! The pipe is `\\.\pipe\<channel>\<port>`. Its first instance is created
//! with `FILE_FLAG_FIRST_PIPE_INSTANCE`, so a name that another process
//! already owns fails instead of silently joining that process's pipe. Every
//! instance carries a DACL built from the configured [`AccessRule`].

use std::ffi::c_void;
use std::io;
use std::time::Duration;

use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeServer, ServerOptions};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{LocalFree, ERROR_PIPE_BUSY, HLOCAL};
use windows::Win32::Security::Authorization::{
    ConvertStringSecurityDescriptorToSecurityDescriptorW, SDDL_REVISION_1,
};
use windows::Win32::Security::{PSECURITY_DESCRIPTOR, SECURITY_ATTRIBUTES};

use super::{AccessRule, BoxedStream, Endpoint};
use crate::error::ChannelError;

const BUSY_RETRY: Duration = Duration::from_millis(50);

/// Accepts connections by handing out one pipe instance per client.
pub struct Listener {
    name: String,
    security: SecurityDescriptor,
    next: NamedPipeServer,
}

impl Listener {
    pub async fn accept(&mut self) -> io::Result<BoxedStream> {
        self.next.connect().await?;
        let fresh = create_instance(&self.name, &self.security, false)?;
        let connected = std::mem::replace(&mut self.next, fresh);
        Ok(Box::new(connected))
    }
}

/// An owned self-relative security descriptor allocated by the SDDL parser.
struct SecurityDescriptor(PSECURITY_DESCRIPTOR);

// SAFETY: the descriptor is immutable after creation and only read by the
// kernel during CreateNamedPipeW; it is freed exactly once in Drop.
unsafe impl Send for SecurityDescriptor {}
unsafe impl Sync for SecurityDescriptor {}

impl SecurityDescriptor {
    fn from_sddl(sddl: &str) -> io::Result<Self> {
        let wide: Vec<u16> = sddl.encode_utf16().chain(std::iter::once(0)).collect();
        let mut descriptor = PSECURITY_DESCRIPTOR::default();
        // SAFETY: `wide` is NUL-terminated and outlives the call; on success
        // `descriptor` receives a LocalAlloc'd buffer that we own.
        unsafe {
            ConvertStringSecurityDescriptorToSecurityDescriptorW(
                PCWSTR(wide.as_ptr()),
                SDDL_REVISION_1,
                &mut descriptor,
                None,
            )
        }
        .map_err(|e| io::Error::from_raw_os_error(e.code().0 & 0xFFFF))?;
        Ok(Self(descriptor))
    }
}

impl Drop for SecurityDescriptor {
    fn drop(&mut self) {
        // SAFETY: the pointer came from ConvertStringSecurityDescriptorToSecurityDescriptorW
        // and is released exactly once.
        unsafe {
            let _ = LocalFree(Some(HLOCAL(self.0 .0)));
        }
    }
}

fn sddl(access: AccessRule) -> &'static str {
    match access {
        // WD = Everyone
        AccessRule::AllLocalUsers => "D:(A;;GA;;;WD)",
        // AU = Authenticated Users
        AccessRule::AuthenticatedUsers => "D:(A;;GA;;;AU)",
        // OW = Owner Rights
        AccessRule::CurrentUser => "D:(A;;GA;;;OW)",
    }
}

pub(super) fn address(endpoint: &Endpoint) -> String {
    format!(r"\\.\pipe\{}\{}", endpoint.channel(), endpoint.port())
}

fn create_instance(
    name: &str,
    security: &SecurityDescriptor,
    first: bool,
) -> io::Result<NamedPipeServer> {
    let mut attributes = SECURITY_ATTRIBUTES {
        nLength: std::mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
        lpSecurityDescriptor: security.0 .0,
        bInheritHandle: false.into(),
    };
    // SAFETY: `attributes` and the descriptor it points to outlive the call.
    unsafe {
        ServerOptions::new()
            .first_pipe_instance(first)
            .reject_remote_clients(true)
            .create_with_security_attributes_raw(name, &mut attributes as *mut _ as *mut c_void)
    }
}

pub(super) fn bind(endpoint: &Endpoint, access: AccessRule) -> Result<Listener, ChannelError> {
    let name = address(endpoint);
    let bind_failed = |source| ChannelError::BindFailed {
        endpoint: endpoint.to_string(),
        source,
    };

    let security = SecurityDescriptor::from_sddl(sddl(access)).map_err(bind_failed)?;
    let next = create_instance(&name, &security, true).map_err(|source| {
        // FILE_FLAG_FIRST_PIPE_INSTANCE reports an existing pipe as access denied.
        if source.kind() == io::ErrorKind::PermissionDenied {
            ChannelError::NameInUse {
                endpoint: endpoint.to_string(),
            }
        } else {
            bind_failed(source)
        }
    })?;

    Ok(Listener { name, security, next })
}

pub(super) async fn connect(endpoint: &Endpoint) -> io::Result<BoxedStream> {
    let name = address(endpoint);
    loop {
        match ClientOptions::new().open(&name) {
            Ok(client) => return Ok(Box::new(client)),
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY.0 as i32) => {}
            Err(e) => return Err(e),
        }
        tokio::time::sleep(BUSY_RETRY).await;
    }
}

/// Named pipes vanish with their last handle; nothing to remove.
pub(super) fn release(_endpoint: &Endpoint) {}
