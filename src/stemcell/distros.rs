//! Distro and infrastructure records

/// An IaaS a stemcell can be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Infrastructure {
    /// Short name as it appears in stemcell names ("aws", "vsphere", ...)
    pub name: &'static str,
    /// Display name
    pub title: &'static str,
}

/// OS name/version pair reported by a stemcell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsMatch {
    pub os_name: &'static str,
    pub os_version: &'static str,
}

/// A stemcell distro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distro {
    /// Stable identifier ("ubuntu-trusty")
    pub name_name: &'static str,
    /// Display name ("Ubuntu Trusty")
    pub name: &'static str,
    pub os_matches: &'static [OsMatch],
    pub supported_infrastructures: &'static [Infrastructure],
    /// Display order, lowest first
    pub sort: u32,
}

impl Distro {
    /// Whether a stemcell with this OS name and version belongs to the distro
    pub fn matches(&self, os_name: &str, os_version: &str) -> bool {
        self.os_matches
            .iter()
            .any(|m| m.os_name == os_name && m.os_version == os_version)
    }

    pub fn supports(&self, infrastructure: &str) -> bool {
        self.supported_infrastructures
            .iter()
            .any(|i| i.name == infrastructure)
    }
}

const AWS: Infrastructure = Infrastructure { name: "aws", title: "AWS" };
const GOOGLE: Infrastructure = Infrastructure { name: "google", title: "Google" };
const AZURE: Infrastructure = Infrastructure { name: "azure", title: "Azure" };
const OPENSTACK: Infrastructure = Infrastructure { name: "openstack", title: "OpenStack" };
const VSPHERE: Infrastructure = Infrastructure { name: "vsphere", title: "vSphere" };
const WARDEN: Infrastructure = Infrastructure { name: "warden", title: "Warden" };

pub const ALL_INFRASTRUCTURES: &[Infrastructure] = &[AWS, GOOGLE, AZURE, OPENSTACK, VSPHERE, WARDEN];

static DISTROS: [Distro; 4] = [
    Distro {
        name_name: "ubuntu-trusty",
        name: "Ubuntu Trusty",
        os_matches: &[OsMatch { os_name: "ubuntu", os_version: "trusty" }],
        supported_infrastructures: ALL_INFRASTRUCTURES,
        sort: 1,
    },
    Distro {
        name_name: "windows2016",
        name: "Windows 2016",
        os_matches: &[OsMatch { os_name: "windows", os_version: "2016" }],
        supported_infrastructures: &[GOOGLE, AZURE],
        sort: 2,
    },
    Distro {
        name_name: "windows2012R2",
        name: "Windows 2012R2",
        os_matches: &[OsMatch { os_name: "windows", os_version: "2012R2" }],
        supported_infrastructures: &[AWS, GOOGLE, AZURE],
        sort: 3,
    },
    Distro {
        name_name: "centos-7",
        name: "CentOS 7",
        os_matches: &[OsMatch { os_name: "centos", os_version: "7" }],
        supported_infrastructures: &[AWS, GOOGLE, AZURE, OPENSTACK, VSPHERE, WARDEN],
        sort: 4,
    },
];

/// Every known distro, in display order
pub fn all_distros() -> Vec<&'static Distro> {
    let mut distros: Vec<&'static Distro> = DISTROS.iter().collect();
    distros.sort_by_key(|d| d.sort);
    distros
}

/// The distro a stemcell with this OS name and version belongs to
pub fn find_distro(os_name: &str, os_version: &str) -> Option<&'static Distro> {
    DISTROS.iter().find(|d| d.matches(os_name, os_version))
}
