use core::fmt::Display;
use kernel_registers::CpuCapabilities;
use log::error;

/// Unwrap `result`, or report the error and stop the machine.
///
/// This is the only place a boot failure turns into a halt; everything
/// below returns errors as values.
pub fn halt_on_error<T, E, C>(cpu: &C, result: Result<T, E>) -> T
where
    E: Display,
    C: CpuCapabilities + ?Sized,
{
    match result {
        Ok(value) => value,
        Err(e) => {
            error!("Fatal: {e}; halting");
            cpu.halt()
        }
    }
}
