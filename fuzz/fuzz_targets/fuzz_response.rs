// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        if let Ok(response) = aetherpulse::gemini::parse_generate_response(body) {
            let _ = response.text();
            let _ = response.first_inline_data();
        }
    }
});
