//! Element sets for tests.

pub const ISS_2020_LINE1: &str =
    "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
pub const ISS_2020_LINE2: &str =
    "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

pub const ISS_2020_TLE: &str = "ISS (ZARYA)
1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992
2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008
";

pub const ISS_2008_TLE: &str = "ISS (ZARYA)
1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927
2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537
";

/// Provider group body with two objects and CRLF line endings.
pub const GROUP_TLE: &str = "\u{feff}ISS (ZARYA)\r
1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992\r
2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008\r
CURTIS\r
1 59507U 98067WG  24125.41361547  .00045442  00000+0  67851-3 0  9999\r
2 59507  51.6343 172.0553 0001518  93.7234 266.3931 15.54580231  3654\r
";

pub const NO_GP_DATA: &str = "No GP data found";

/// ISS block whose epoch columns carry a non-ASCII character.
pub const ISS_GARBLED_EPOCH_TLE: &str = "ISS (ZARYA)
1 25544U 98067A   1\u{e9}23.88612269 -.00002218  00000-0 -31515-4 0  9992
2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008
";
