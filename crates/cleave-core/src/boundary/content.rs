use memchr::{memchr, memmem};

const DOUBLE_NEWLINE: &[u8] = b"\n\n";
const JSON_OBJECT_END: &[u8] = b"]}";

/// Minimum run of NUL bytes treated as a structural break.
const NUL_RUN_LEN: usize = 16;

/// Finds the earliest structural break in `window`, returning the cut
/// position just past the matched pattern (relative to the window start).
pub(crate) fn find_structural_cut(window: &[u8]) -> Option<usize> {
    let newline = memmem::find(window, DOUBLE_NEWLINE).map(|at| at + DOUBLE_NEWLINE.len());
    let json = memmem::find(window, JSON_OBJECT_END).map(|at| at + JSON_OBJECT_END.len());
    let nul = find_nul_run(window).map(|at| at + NUL_RUN_LEN);
    [newline, json, nul].into_iter().flatten().min()
}

/// Start of the first run of at least `NUL_RUN_LEN` zero bytes.
fn find_nul_run(window: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(at) = memchr(0, &window[from..]) {
        let start = from + at;
        let run_end = window[start..]
            .iter()
            .position(|&b| b != 0)
            .map_or(window.len(), |len| start + len);
        if run_end - start >= NUL_RUN_LEN {
            return Some(start);
        }
        from = run_end;
    }
    None
}
