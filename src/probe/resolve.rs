//! Address resolution.
//!
//! Literal IPs pass through untouched. Hostnames go through system DNS, or
//! through an external resolver tool when the target carries its own DNS
//! server. Nothing is cached: each probe re-resolves so DNS changes are
//! picked up at the next cycle.

use std::net::IpAddr;

use tokio::process::Command;

use super::ProbeError;

/// Resolve an address to an IP literal.
pub async fn resolve(address: &str, dns_server: &str) -> Result<String, ProbeError> {
    if address.parse::<IpAddr>().is_ok() {
        return Ok(address.to_string());
    }

    if dns_server.is_empty() {
        resolve_system(address).await
    } else {
        resolve_with_server(address, dns_server).await
    }
}

/// System-default lookup, preferring the first IPv4 result.
async fn resolve_system(hostname: &str) -> Result<String, ProbeError> {
    let addrs: Vec<IpAddr> = tokio::net::lookup_host(format!("{}:0", hostname))
        .await
        .map_err(|e| ProbeError::Resolution(format!("{}: {}", hostname, e)))?
        .map(|sa| sa.ip())
        .collect();

    if let Some(v4) = addrs.iter().find(|ip| ip.is_ipv4()) {
        return Ok(v4.to_string());
    }

    addrs
        .first()
        .map(|ip| ip.to_string())
        .ok_or_else(|| ProbeError::Resolution(format!("no addresses found for {}", hostname)))
}

/// Lookup against a specific DNS server via external tools: `dig +short`
/// first, `nslookup` as the fallback.
async fn resolve_with_server(hostname: &str, dns_server: &str) -> Result<String, ProbeError> {
    let dig = Command::new("dig")
        .args(["+short", &format!("@{}", dns_server), hostname])
        .output()
        .await;

    if let Ok(output) = dig {
        if output.status.success() {
            if let Some(ip) = parse_resolver_output(&String::from_utf8_lossy(&output.stdout)) {
                return Ok(ip);
            }
        }
    }

    let output = Command::new("nslookup")
        .args([hostname, dns_server])
        .output()
        .await
        .map_err(|e| ProbeError::Resolution(format!("failed to run resolver: {}", e)))?;

    parse_resolver_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        ProbeError::Resolution(format!("no IP in resolver output for {}", hostname))
    })
}

/// Extract the first IP literal from resolver tool output.
///
/// Accepts a bare IP line (dig +short) or an nslookup `Address:` line. Lines
/// containing `#` are skipped so the server's own `Address: 1.2.3.4#53`
/// listing is never mistaken for the answer.
fn parse_resolver_output(output: &str) -> Option<String> {
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.parse::<IpAddr>().is_ok() {
            return Some(line.to_string());
        }

        if line.contains("Address:") && !line.contains('#') {
            if let Some((_, value)) = line.split_once("Address:") {
                let value = value.trim();
                if value.parse::<IpAddr>().is_ok() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_ipv4_short_circuits() {
        // A bogus DNS server proves no external lookup happens.
        let ip = resolve("192.0.2.1", "203.0.113.99").await.unwrap();
        assert_eq!(ip, "192.0.2.1");
    }

    #[tokio::test]
    async fn literal_ipv6_short_circuits() {
        let ip = resolve("2001:4860:4860::8888", "").await.unwrap();
        assert_eq!(ip, "2001:4860:4860::8888");
    }

    #[test]
    fn parses_dig_short_output() {
        let output = "140.82.112.3\n";
        assert_eq!(parse_resolver_output(output).unwrap(), "140.82.112.3");
    }

    #[test]
    fn skips_server_listing_with_hash() {
        let output = "\
Server:\t\t8.8.8.8
Address:\t8.8.8.8#53

Non-authoritative answer:
Name:\tgithub.com
Address: 140.82.112.3
";
        assert_eq!(parse_resolver_output(output).unwrap(), "140.82.112.3");
    }

    #[test]
    fn parses_ipv6_address_line() {
        let output = "Address: 2606:4700:4700::1111\n";
        assert_eq!(
            parse_resolver_output(output).unwrap(),
            "2606:4700:4700::1111"
        );
    }

    #[test]
    fn cname_chain_yields_first_ip() {
        let output = "some.alias.example.net.\n93.184.216.34\n";
        assert_eq!(parse_resolver_output(output).unwrap(), "93.184.216.34");
    }

    #[test]
    fn no_answer_yields_none() {
        assert!(parse_resolver_output("").is_none());
        assert!(parse_resolver_output("Server:\t8.8.8.8\nAddress:\t8.8.8.8#53\n").is_none());
    }
}
