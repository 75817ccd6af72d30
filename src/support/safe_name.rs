//-
// Copyright (c) 2020, 2024, Jason Lingle
//
// This file is part of msmtpq.
//
// msmtpq is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// msmtpq is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// msmtpq. If not, see <http://www.gnu.org/licenses/>.

/// Determine whether the given name is "safe" to use as a queue key.
///
/// Keys are used directly as file names within the queue directory. This
/// excludes empty names and patterns that cause directory traversal or other
/// unwanted behaviours. Names with a leading `.` are also excluded, which
/// keeps hidden files (including staged writes) out of the queue.
///
/// This does not care about whether the name is ultimately a valid file name;
/// for that, we simply rely on the OS rejecting it.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() &&
        // Block directory traversal through .. and hidden files on UNIX
        name.chars().next() != Some('.') &&
        name.find('/').is_none() &&
        // Only a path separator on Windows, but always block since it has high
        // potential of causing problems
        name.find('\\').is_none() &&
        // Don't allow any ASCII control characters
        name.find(|c| c < ' ' || c == '\x7F').is_none()
}
