use std::net::Ipv4Addr;

/// Names the fake upstream knows about.
pub struct TestDomains;

impl TestDomains {
    pub fn example() -> &'static str {
        "example.com"
    }

    pub fn example_ip() -> Ipv4Addr {
        Ipv4Addr::new(93, 184, 216, 34)
    }

    /// Answered with enough records to overflow a 512-byte datagram.
    pub fn large() -> &'static str {
        "large.example.com"
    }

    pub fn large_record_count() -> usize {
        60
    }

    /// Answered with NXDOMAIN.
    pub fn missing() -> &'static str {
        "missing.example.com"
    }
}
