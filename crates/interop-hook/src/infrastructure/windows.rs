//! Windows low-level keyboard hook implementation.
//!
//! The `WH_KEYBOARD_LL` hook is installed from a dedicated thread that owns a
//! Win32 message loop. Windows calls [`keyboard_hook_proc`] on that thread,
//! so the active sink is kept in a thread-local.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use interop_core::KeyModifiers;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, VIRTUAL_KEY, VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetForegroundWindow, GetMessageW, GetWindowThreadProcessId,
    PeekMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG,
    PM_NOREMOVE, WH_KEYBOARD_LL, WM_QUIT, WM_USER,
};

use super::{
    decode_hook_event, Desktop, HookDecision, HookError, HookGuard, HookInstaller, KeystrokeSink,
    WindowInfo,
};

thread_local! {
    /// Sink for the hook installed on this thread.
    static HOOK_SINK: RefCell<Option<Arc<dyn KeystrokeSink>>> = const { RefCell::new(None) };
}

// ── Hook installer ────────────────────────────────────────────────────────────

/// Installs the real system-wide keyboard hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsHookInstaller;

impl WindowsHookInstaller {
    pub fn new() -> Self {
        Self
    }
}

impl HookInstaller for WindowsHookInstaller {
    fn install(&self, sink: Arc<dyn KeystrokeSink>) -> Result<Box<dyn HookGuard>, HookError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

        let thread = thread::Builder::new()
            .name("interop-keyboard-hook".to_string())
            .spawn(move || run_hook_message_loop(sink, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => Ok(Box::new(WindowsHookGuard {
                thread_id,
                thread: Some(thread),
            })),
            Ok(Err(reason)) => {
                let _ = thread.join();
                Err(HookError::InstallFailed(reason))
            }
            Err(_) => {
                let _ = thread.join();
                Err(HookError::InstallFailed("hook thread exited during startup".to_string()))
            }
        }
    }
}

/// Entry point for the dedicated Win32 message loop thread.
fn run_hook_message_loop(sink: Arc<dyn KeystrokeSink>, ready: mpsc::Sender<Result<u32, String>>) {
    HOOK_SINK.with(|slot| *slot.borrow_mut() = Some(sink));

    let mut msg = MSG::default();
    // SAFETY: Peeking forces Windows to create this thread's message queue so
    // that PostThreadMessageW from the guard cannot be lost.
    unsafe {
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
    }

    // SAFETY: SetWindowsHookExW requires the calling thread to run a message
    // loop, which this thread does until WM_QUIT.
    let installed = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) };
    let hook = match installed {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    // SAFETY: GetCurrentThreadId has no preconditions.
    let thread_id = unsafe { GetCurrentThreadId() };
    let _ = ready.send(Ok(thread_id));
    tracing::debug!(thread_id, "keyboard hook installed");

    // SAFETY: Standard Win32 GetMessage/DispatchMessage loop pattern.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        UnhookWindowsHookEx(hook).ok();
    }

    HOOK_SINK.with(|slot| slot.borrow_mut().take());
    tracing::debug!(thread_id, "keyboard hook removed");
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// Called by Windows from the hook message loop thread. It must return
/// quickly to avoid removal of the hook by the OS.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code < 0 {
        // SAFETY: Must call CallNextHookEx when n_code < 0.
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code >= 0.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);

    let decision = decode_hook_event(n_code, w_param.0 as u32, kbs.vkCode)
        .and_then(|event| {
            HOOK_SINK.with(|slot| slot.borrow().as_ref().map(|sink| sink.on_key(event)))
        })
        .unwrap_or(HookDecision::Forward);

    match decision {
        HookDecision::Consume => LRESULT(1),
        // SAFETY: Forward the event to the next hook in the chain.
        HookDecision::Forward => CallNextHookEx(None, n_code, w_param, l_param),
    }
}

struct WindowsHookGuard {
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl HookGuard for WindowsHookGuard {
    fn uninstall(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // SAFETY: Posting WM_QUIT to a thread we own; the queue exists since
        // the thread peeked before reporting ready.
        let posted = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            tracing::warn!("could not stop keyboard hook thread: {e}");
            return;
        }
        if thread.join().is_err() {
            tracing::error!("keyboard hook thread panicked");
        }
    }
}

impl Drop for WindowsHookGuard {
    fn drop(&mut self) {
        self.uninstall();
    }
}

// ── Desktop ───────────────────────────────────────────────────────────────────

/// Reads foreground window and modifier state from the Win32 API.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsDesktop;

impl WindowsDesktop {
    pub fn new() -> Self {
        Self
    }
}

fn is_key_down(key: VIRTUAL_KEY) -> bool {
    // SAFETY: GetAsyncKeyState only reads global key state.
    let state = unsafe { GetAsyncKeyState(i32::from(key.0)) };
    state < 0
}

impl Desktop for WindowsDesktop {
    fn foreground_window(&self) -> Option<WindowInfo> {
        // SAFETY: GetForegroundWindow has no preconditions.
        let hwnd: HWND = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            return None;
        }
        let mut process_id = 0u32;
        // SAFETY: hwnd was just returned by the system and process_id is a
        // valid out pointer for the duration of the call.
        unsafe {
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        }
        Some(WindowInfo {
            handle: hwnd.0 as i64,
            process_id,
        })
    }

    fn modifiers(&self) -> KeyModifiers {
        KeyModifiers::from_flags(
            is_key_down(VK_CONTROL),
            is_key_down(VK_MENU),
            is_key_down(VK_SHIFT),
            is_key_down(VK_LWIN) || is_key_down(VK_RWIN),
        )
    }
}
